//! Stage sequencing.
//!
//! Runs the whole preparation pipeline over one module: visibility
//! partition, empty ctor/dtor removal, always-inline marking, argument
//! serialization, SPIR conversion, symbol cleanup. The kernel registry is
//! owned by the caller and outlives individual modules, so short kernel
//! IDs stay stable across a whole build session. The first structural
//! violation aborts the module.
use log::info;
use syinstr::{callgraph::CallGraph, layout::DataLayout, modules::Module, types::TypeRegistry};

use crate::{
    ancestry::AncestrySet,
    kernel::{Demangler, KernelClassifier},
    passes::{self, serialize::LoweringShape},
    registry::KernelRegistry,
    utils::SyResult,
};

/// Pipeline configuration.
#[derive(Debug, Default, Clone, Copy)]
pub struct DriverConfig {
    /// Attach `reqd_work_group_size` = (1,1,1) to every kernel.
    pub emit_reqd_work_group_size: bool,
    /// Which shape of the serialization protocol to emit.
    pub lowering: LoweringShape,
}

/// What one driver run did to a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverReport {
    /// Kernels or kernel call sites lowered, depending on the shape.
    pub processed: usize,
}

pub struct Driver<'a> {
    demangler: &'a dyn Demangler,
    config: DriverConfig,
}

impl<'a> Driver<'a> {
    pub fn new(demangler: &'a dyn Demangler, config: DriverConfig) -> Self {
        Driver { demangler, config }
    }

    /// Run every stage over `module`, in order.
    pub fn run(
        &self,
        module: &mut Module,
        types: &TypeRegistry,
        layout: &DataLayout,
        registry: &mut KernelRegistry,
    ) -> SyResult<DriverReport> {
        let classifier = KernelClassifier::new(self.demangler);

        passes::filter::run(module, &classifier, registry);
        passes::cdtors::run(module);

        // Ancestry is computed against the renamed module; the short-name
        // fast path keeps classification cheap from here on.
        let graph = CallGraph::build(module);
        let ancestry = AncestrySet::compute(module, &graph, &classifier);
        passes::inline_mark::run(module, &ancestry);

        let report =
            passes::serialize::run(module, types, layout, &classifier, self.config.lowering)?;

        // The lowering rewrites bodies, so reachability is recomputed
        // before the ABI switch.
        let graph = CallGraph::build(module);
        let ancestry = AncestrySet::compute(module, &graph, &classifier);
        passes::inspire::run(
            module,
            types,
            &ancestry,
            &classifier,
            self.config.emit_reqd_work_group_size,
        );
        passes::cleanup::run(module, &ancestry);

        info!(
            "module `{}` prepared: {} lowered, {} kernels known to the session",
            module.name,
            report.processed,
            registry.len()
        );
        Ok(DriverReport {
            processed: report.processed,
        })
    }
}
