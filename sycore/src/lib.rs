//! Middle-end pipeline preparing heterogeneous-offload IR for accelerator
//! codegen.
//!
//! Given a whole-program module mixing host code and single-source
//! kernels, the pipeline identifies kernels from their mangled names,
//! computes kernel reachability over the call graph, partitions symbol
//! visibility so dead-code elimination can strip the host side, lowers
//! kernel argument passing into the device-runtime serialization
//! protocol, synthesizes the portable SPIR kernel ABI and metadata, and
//! sanitizes symbols for downstream tools. Most consumers drive the whole
//! thing through [`driver::Driver`].

pub mod ancestry;
pub mod driver;
pub mod kernel;
pub mod passes;
pub mod registry;
#[cfg(any(test, feature = "test-utils"))]
pub mod tests_utils;
pub mod utils;
