//! SPIR ABI and metadata synthesis.
//!
//! Turns every kernel into a portable compute kernel: SPIR kernel calling
//! convention, no exception personality, and the per-argument metadata an
//! OpenCL-style consumer expects. Functions with kernel context that are
//! not kernels themselves get the SPIR device-function convention so they
//! survive the ABI switch. Module-level version tags and the portable
//! target triple are attached once per module.
use log::{debug, info};
use syinstr::{
    modules::{CallingConvention, Function, MetaValue, Module, ParamAttrs},
    types::{TypeRegistry, Typeref},
};

use crate::{ancestry::AncestrySet, kernel::KernelClassifier, passes::PassOutcome};

pub const SPIR_TRIPLE: &str = "spir64";

/// `(opencl.spir.version, opencl.ocl.version)` attached to the module.
const SPIR_VERSION: (u64, u64) = (2, 0);
const OCL_VERSION: (u64, u64) = (1, 2);

/// Rewrite a rendered type name into the portable OpenCL spelling.
///
/// The rewrite is textual on purpose: it must also reach into aggregate
/// renderings like `[4 x i32]`. The `i16` rule has to run before the `i1`
/// rule, otherwise every 16-bit spelling decays to `bool6`.
fn normalize_type_name(rendered: &str) -> String {
    let mut name = strip_addrspace(rendered);
    for (from, to) in [
        ("i8", "char"),
        ("i16", "short"),
        ("i32", "int"),
        ("i64", "long"),
        ("i1", "bool"),
    ] {
        name = name.replace(from, to);
    }
    name
}

/// Drop every ` addrspace(N)` qualifier from a rendered type name.
fn strip_addrspace(rendered: &str) -> String {
    const MARKER: &str = " addrspace(";
    let mut out = String::with_capacity(rendered.len());
    let mut rest = rendered;
    while let Some(start) = rest.find(MARKER) {
        out.push_str(&rest[..start]);
        let after = &rest[start + MARKER.len()..];
        match after.find(')') {
            Some(end) => rest = &after[end + 1..],
            None => {
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

fn type_qualifiers(attrs: ParamAttrs) -> String {
    let mut quals: Vec<&str> = Vec::new();
    if attrs.contains(ParamAttrs::READ_ONLY) {
        quals.push("const");
    }
    if attrs.contains(ParamAttrs::NO_ALIAS) {
        quals.push("restrict");
    }
    quals.join(" ")
}

fn attach_kernel_metadata(
    function: &mut Function,
    types: &TypeRegistry,
    emit_reqd_work_group_size: bool,
) {
    let render = |ty: Typeref| normalize_type_name(&types.fmt(ty).to_string());

    let mut addr_spaces = Vec::with_capacity(function.params.len());
    let mut type_names = Vec::with_capacity(function.params.len());
    let mut base_type_names = Vec::with_capacity(function.params.len());
    let mut qualifiers = Vec::with_capacity(function.params.len());
    let mut access = Vec::with_capacity(function.params.len());
    for param in &function.params {
        let addr_space = types.as_pointer(param.ty).map_or(0, |p| p.addr_space);
        addr_spaces.push(MetaValue::Int(addr_space as u64));
        let name = render(param.ty);
        type_names.push(MetaValue::Str(name.clone()));
        base_type_names.push(MetaValue::Str(name));
        qualifiers.push(MetaValue::Str(type_qualifiers(param.attrs)));
        access.push(MetaValue::Str("read_write".to_string()));
    }

    function
        .metadata
        .insert("kernel_arg_addr_space".to_string(), addr_spaces);
    function
        .metadata
        .insert("kernel_arg_type".to_string(), type_names);
    function
        .metadata
        .insert("kernel_arg_base_type".to_string(), base_type_names);
    function
        .metadata
        .insert("kernel_arg_type_qual".to_string(), qualifiers);
    function
        .metadata
        .insert("kernel_arg_access_qual".to_string(), access);
    if emit_reqd_work_group_size {
        function.metadata.insert(
            "reqd_work_group_size".to_string(),
            vec![MetaValue::Int(1), MetaValue::Int(1), MetaValue::Int(1)],
        );
    }
}

pub fn run(
    module: &mut Module,
    types: &TypeRegistry,
    ancestry: &AncestrySet,
    classifier: &KernelClassifier<'_>,
    emit_reqd_work_group_size: bool,
) -> PassOutcome {
    let mut kernels = 0usize;
    let mut device_functions = 0usize;
    for function in module.functions.values_mut() {
        // The ABI switch is for code generated here; declarations keep
        // whatever convention their defining module gives them.
        if function.is_declaration() {
            continue;
        }
        if classifier.is_kernel(function) {
            function.cconv = CallingConvention::SpirKernel;
            // Portable kernels assume no unwinding.
            function.personality = None;
            attach_kernel_metadata(function, types, emit_reqd_work_group_size);
            debug!("`{}` converted to a SPIR kernel", function.name);
            kernels += 1;
        } else if ancestry.contains(function.uuid) {
            function.cconv = CallingConvention::SpirFunc;
            device_functions += 1;
        }
    }

    if kernels == 0 && device_functions == 0 {
        return PassOutcome::Unchanged;
    }

    module.metadata.insert(
        "opencl.spir.version".to_string(),
        vec![vec![
            MetaValue::Int(SPIR_VERSION.0),
            MetaValue::Int(SPIR_VERSION.1),
        ]],
    );
    module.metadata.insert(
        "opencl.ocl.version".to_string(),
        vec![vec![
            MetaValue::Int(OCL_VERSION.0),
            MetaValue::Int(OCL_VERSION.1),
        ]],
    );
    module.target_triple = Some(SPIR_TRIPLE.to_string());

    info!(
        "SPIR conversion: {} kernels, {} device functions",
        kernels, device_functions
    );
    PassOutcome::Changed
}
