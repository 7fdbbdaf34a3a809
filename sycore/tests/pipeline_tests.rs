use std::collections::BTreeMap;

use sycore::{
    driver::{Driver, DriverConfig},
    kernel::Demangler,
    passes::serialize::{LoweringShape, runtime},
    registry::KernelRegistry,
};
use syinstr::{
    layout::DataLayout,
    modules::{
        BasicBlock, CallingConvention, FnAttrs, Function, Linkage, Module, Parameter,
        call::Call,
        instructions::Instr,
        operand::{Const, Label, Operand},
        terminator::{Jump, Ret, Terminator},
    },
    types::{TypeRegistry, primary::IType},
};
use uuid::Uuid;

const KERNEL_SYMBOL: &str = "_ZTSZ4mainE10add_arrays";

struct OneKernelDemangler;

impl Demangler for OneKernelDemangler {
    fn demangle(&self, mangled: &str) -> Option<String> {
        (mangled == KERNEL_SYMBOL).then(|| {
            "void cl::sycl::detail::instantiate_kernel<add_arrays>()".to_string()
        })
    }
}

fn empty_function(name: &str) -> Function {
    Function {
        uuid: Uuid::nil(),
        name: name.to_string(),
        linkage: Linkage::External,
        cconv: CallingConvention::C,
        params: vec![],
        return_type: None,
        body: BTreeMap::new(),
        attrs: FnAttrs::empty(),
        personality: None,
        metadata: BTreeMap::new(),
    }
}

/// Kernel formals: (i32 addrspace(1)*, i64, i8 addrspace(1)*).
fn kernel_formals(types: &TypeRegistry) -> Vec<Parameter> {
    let i32_ref = types.search_or_insert(IType::I32.into());
    let i64_ref = types.search_or_insert(IType::I64.into());
    let i8_ref = types.search_or_insert(IType::I8.into());
    vec![
        Parameter::new(0, types.pointer_to(i32_ref, 1)),
        Parameter::new(1, i64_ref),
        Parameter::new(2, types.pointer_to(i8_ref, 1)),
    ]
}

fn marker_then_call(marker: Uuid, kernel: Uuid) -> Vec<Instr> {
    vec![
        Call::direct_void(marker, vec![Operand::Reg(0)]).into(),
        Call::direct_void(
            kernel,
            vec![Operand::Reg(1), Operand::Reg(2), Operand::Reg(3)],
        )
        .into(),
    ]
}

/// One module with a kernel, the runtime declarations, and a host function
/// that invokes the kernel from two different basic blocks.
fn two_call_site_module(types: &TypeRegistry) -> Module {
    let mut module = Module::new("unit");
    for symbol in [
        runtime::SERIALIZE_ARG,
        runtime::LAUNCH_KERNEL,
        runtime::SET_KERNEL,
        runtime::BIND_TASK_MARKER,
    ] {
        module.declare_function(symbol, vec![], None);
    }

    let mut kernel = empty_function(KERNEL_SYMBOL);
    kernel.params = kernel_formals(types);
    kernel.body.insert(
        Label::NIL,
        BasicBlock {
            label: Label::NIL,
            name: None,
            instructions: vec![],
            terminator: Terminator::ret_void(),
        },
    );
    let kernel = module.add_function(kernel);
    let marker = module
        .function_by_name(runtime::BIND_TASK_MARKER)
        .map(|f| f.uuid)
        .unwrap();

    let mut host = empty_function("main");
    host.params = vec![
        Parameter::new(0, types.byte_pointer()),
        Parameter::new(1, kernel_formals(types)[0].ty),
        Parameter::new(2, kernel_formals(types)[1].ty),
        Parameter::new(3, kernel_formals(types)[2].ty),
    ];
    host.body.insert(
        Label::NIL,
        BasicBlock {
            label: Label::NIL,
            name: Some("first_launch".to_string()),
            instructions: marker_then_call(marker, kernel),
            terminator: Terminator::Jump(Jump { target: Label(1) }),
        },
    );
    host.body.insert(
        Label(1),
        BasicBlock {
            label: Label(1),
            name: Some("second_launch".to_string()),
            instructions: marker_then_call(marker, kernel),
            terminator: Terminator::Ret(Ret { value: None }),
        },
    );
    module.add_function(host);
    module
}

fn callee_uuid(module: &Module, name: &str) -> Uuid {
    module.function_by_name(name).map(|f| f.uuid).unwrap()
}

fn serialized_pairs(module: &Module, block: &BasicBlock) -> Vec<(u64, u64)> {
    let serialize = callee_uuid(module, runtime::SERIALIZE_ARG);
    block
        .instructions
        .iter()
        .filter(|i| i.as_direct_call() == Some(serialize))
        .map(|i| {
            let call = i.try_as_call_ref().unwrap();
            match (&call.args[1], &call.args[3]) {
                (
                    Operand::Imm(Const::Int { value: index, .. }),
                    Operand::Imm(Const::Int { value: size, .. }),
                ) => (*index, *size),
                other => panic!("malformed serialize call operands: {:?}", other),
            }
        })
        .collect()
}

#[test]
fn two_call_sites_are_both_lowered() {
    let types = TypeRegistry::new();
    let layout = DataLayout::spir64();
    let mut module = two_call_site_module(&types);
    let mut registry = KernelRegistry::new();

    let driver = Driver::new(
        &OneKernelDemangler,
        DriverConfig {
            emit_reqd_work_group_size: false,
            lowering: LoweringShape::CallSites,
        },
    );
    let report = driver
        .run(&mut module, &types, &layout, &mut registry)
        .unwrap();

    // One rewrite per call site, not per kernel.
    assert_eq!(report.processed, 2);

    // The kernel is renamed to its stable short symbol. Once every call
    // site goes through the launch protocol the definition is referenced
    // by name string only, so it is internalized along with the host side
    // and the whole module can be stripped.
    let kernel = module.function_by_name("TRISYCL_kernel_0").unwrap();
    assert_eq!(kernel.linkage, Linkage::Internal);
    assert_eq!(kernel.cconv, CallingConvention::SpirKernel);
    let host = module.function_by_name("main").unwrap();
    assert_eq!(host.linkage, Linkage::Internal);

    let kernel_uuid = kernel.uuid;
    let marker = callee_uuid(&module, runtime::BIND_TASK_MARKER);
    let set_kernel = callee_uuid(&module, runtime::SET_KERNEL);
    let launch = callee_uuid(&module, runtime::LAUNCH_KERNEL);
    for block in host.body.values() {
        let calls: Vec<Uuid> = block
            .instructions
            .iter()
            .filter_map(|i| i.as_direct_call())
            .collect();
        // Marker and kernel call are gone, the protocol bracket is there.
        assert!(!calls.contains(&kernel_uuid));
        assert!(!calls.contains(&marker));
        assert_eq!(calls.first(), Some(&set_kernel));
        assert_eq!(calls.last(), Some(&launch));

        // Wire contract: indices in call order, sizes from the data layout
        // (pointee, value, pointee).
        assert_eq!(serialized_pairs(&module, block), vec![(0, 4), (1, 8), (2, 1)]);

        // The launch call carries the post-rename kernel name.
        let launch_call = block
            .instructions
            .iter()
            .find(|i| i.as_direct_call() == Some(launch))
            .and_then(|i| i.try_as_call_ref())
            .unwrap();
        assert_eq!(
            launch_call.args.get(1),
            Some(&Operand::Imm(Const::Str("TRISYCL_kernel_0".to_string())))
        );
    }

    assert_eq!(module.target_triple.as_deref(), Some("spir64"));
    assert_eq!(registry.len(), 1);
}

#[test]
fn replace_body_pipeline_is_reproducible() {
    let build = || {
        let types = TypeRegistry::new();
        let layout = DataLayout::spir64();
        let mut module = Module::new("unit");
        for symbol in [
            runtime::SERIALIZE_ARG,
            runtime::LAUNCH_KERNEL,
            runtime::SET_KERNEL,
            runtime::BIND_TASK_MARKER,
        ] {
            module.declare_function(symbol, vec![], None);
        }
        let mut kernel = empty_function(KERNEL_SYMBOL);
        // Task handle first, then the payload formals.
        let mut params = vec![Parameter::new(0, types.byte_pointer())];
        params.extend(
            kernel_formals(&types)
                .into_iter()
                .map(|p| Parameter::new(p.name + 1, p.ty)),
        );
        kernel.params = params;
        kernel.body.insert(
            Label::NIL,
            BasicBlock {
                label: Label::NIL,
                name: None,
                instructions: vec![],
                terminator: Terminator::ret_void(),
            },
        );
        module.add_function(kernel);

        let mut registry = KernelRegistry::new();
        let driver = Driver::new(&OneKernelDemangler, DriverConfig::default());
        let report = driver
            .run(&mut module, &types, &layout, &mut registry)
            .unwrap();
        assert_eq!(report.processed, 1);
        module
    };

    assert_eq!(build(), build());
}

#[test]
fn kernel_ids_survive_across_modules_in_one_session() {
    let types = TypeRegistry::new();
    let layout = DataLayout::spir64();
    let mut registry = KernelRegistry::new();
    let driver = Driver::new(
        &OneKernelDemangler,
        DriverConfig {
            emit_reqd_work_group_size: false,
            lowering: LoweringShape::CallSites,
        },
    );

    let mut first = two_call_site_module(&types);
    driver
        .run(&mut first, &types, &layout, &mut registry)
        .unwrap();
    let mut second = two_call_site_module(&types);
    driver
        .run(&mut second, &types, &layout, &mut registry)
        .unwrap();

    assert!(first.function_by_name("TRISYCL_kernel_0").is_some());
    assert!(second.function_by_name("TRISYCL_kernel_0").is_some());
    assert_eq!(registry.len(), 1);
}
