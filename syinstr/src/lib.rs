//! In-memory IR for heterogeneous offload modules.
//!
//! This crate defines the data model the device-side preparation passes
//! operate on: a [`modules::Module`] holding functions, globals and
//! aliases, a deduplicating [`types::TypeRegistry`], a target
//! [`layout::DataLayout`] and the direct [`callgraph::CallGraph`].
pub mod callgraph;
pub mod layout;
pub mod modules;
pub mod types;
pub mod utils;
