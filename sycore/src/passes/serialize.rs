//! Argument serialization lowering.
//!
//! Replaces a kernel's native argument passing with the device-runtime
//! hand-off protocol: bind the task to the kernel name, serialize each
//! argument as an (index, byte pointer, byte size) triple, then launch.
//! Pointer arguments pass by reference (the runtime dereferences, size is
//! the pointee's allocation size); everything else is spilled to a fresh
//! stack slot so the runtime sees a stable address, and the size is the
//! value type's allocation size. Indices are assigned 0-based in strict
//! left-to-right order; this is part of the wire contract.
//!
//! Two shapes of the protocol exist and both are supported: in-place body
//! replacement, which turns the kernel definition itself into a
//! serialization trampoline over its formal parameters, and call-site
//! rewriting, which consumes a task-binding marker and serializes the
//! actual arguments at every host-side call into a kernel.
use log::{debug, info};
use smallvec::SmallVec;
use strum::EnumIs;
use syinstr::{
    layout::DataLayout,
    modules::{
        BasicBlock, Linkage, Module,
        call::Call,
        instructions::Instr,
        mem::{Alloca, PtrCast, Store},
        operand::{Const, Label, Name, Operand},
        terminator::Terminator,
    },
    types::{AnyType, TypeRegistry, Typeref, primary::IType},
};
use uuid::Uuid;

use crate::{
    kernel::KernelClassifier,
    utils::{SyError, SyResult},
};

/// Mangled names of the device-runtime entry points. These are a wire
/// contract with the runtime library and must match exactly.
pub mod runtime {
    /// `serialize_arg(task, index, pointer, size)`
    pub const SERIALIZE_ARG: &str = "_ZN2cl4sycl3drt13serialize_argERNS0_6detail4taskEmPvm";
    /// `launch_kernel(task, name)`
    pub const LAUNCH_KERNEL: &str = "_ZN2cl4sycl3drt13launch_kernelERNS0_6detail4taskEPKc";
    /// `set_kernel(task, name)`
    pub const SET_KERNEL: &str = "_ZN2cl4sycl3drt10set_kernelERNS0_6detail4taskEPKc";
    /// `bind_kernel_task_marker(task)`
    pub const BIND_TASK_MARKER: &str = "_ZN2cl4sycl3drt23bind_kernel_task_markerERNS0_6detail4taskE";
}

/// Which evolution of the protocol to emit.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, EnumIs)]
pub enum LoweringShape {
    /// Discard each kernel body and serialize its formal parameters. The
    /// first formal is the runtime task handle.
    #[default]
    ReplaceBody,

    /// Rewrite every host-side call into a kernel, serializing the actual
    /// arguments. The task handle comes from the preceding binding marker.
    CallSites,
}

/// What the lowering did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoweringReport {
    /// Kernels rewritten (replace-body) or call sites rewritten
    /// (call-site shape).
    pub processed: usize,
}

/// Resolved identities of the runtime entry points within one module.
struct RuntimeProtocol {
    serialize_arg: Uuid,
    set_kernel: Uuid,
    launch_kernel: Uuid,
    bind_marker: Option<Uuid>,
}

impl RuntimeProtocol {
    fn resolve(module: &Module, shape: LoweringShape) -> SyResult<Self> {
        let required = |symbol: &str| -> SyResult<Uuid> {
            module
                .function_by_name(symbol)
                .map(|f| f.uuid)
                .ok_or_else(|| SyError::MissingRuntimeSymbol {
                    symbol: symbol.to_string(),
                })
        };
        Ok(RuntimeProtocol {
            serialize_arg: required(runtime::SERIALIZE_ARG)?,
            set_kernel: required(runtime::SET_KERNEL)?,
            launch_kernel: required(runtime::LAUNCH_KERNEL)?,
            bind_marker: match shape {
                LoweringShape::ReplaceBody => None,
                LoweringShape::CallSites => Some(required(runtime::BIND_TASK_MARKER)?),
            },
        })
    }
}

/// One serialized argument: the instructions that materialize its byte
/// pointer, the pointer operand itself, and its byte size.
struct LoweredArg {
    setup: SmallVec<[Instr; 3]>,
    pointer: Operand,
    size: u64,
}

fn lower_argument(
    types: &TypeRegistry,
    layout: &DataLayout,
    ty: Typeref,
    value: Operand,
    next: &mut Name,
) -> SyResult<LoweredArg> {
    let mut fresh = || {
        let name = *next;
        *next += 1;
        name
    };
    let described = types
        .get(ty)
        .ok_or(syinstr::utils::Error::UnknownType { typeref: ty.raw() })?
        .clone();
    let i8_ref = types.search_or_insert(IType::I8.into());

    match described {
        AnyType::Pointer(pointer) => {
            // Pass by reference: the runtime dereferences, so the size is
            // the pointee's, not the pointer's.
            let size = layout.alloc_size(types, pointer.pointee)?;
            let dest = fresh();
            let to = types.pointer_to(i8_ref, pointer.addr_space);
            let mut setup = SmallVec::new();
            setup.push(Instr::from(PtrCast { dest, value, to }));
            Ok(LoweredArg {
                setup,
                pointer: Operand::Reg(dest),
                size,
            })
        }
        _ => {
            // Pass by value: spill to a stack slot so the runtime copies
            // from a stable address.
            let size = layout.alloc_size(types, ty)?;
            let slot = fresh();
            let cast = fresh();
            let mut setup = SmallVec::new();
            setup.push(Instr::from(Alloca {
                dest: slot,
                ty,
                alignment: None,
            }));
            setup.push(Instr::from(Store {
                addr: Operand::Reg(slot),
                value,
            }));
            setup.push(Instr::from(PtrCast {
                dest: cast,
                value: Operand::Reg(slot),
                to: types.pointer_to(i8_ref, 0),
            }));
            Ok(LoweredArg {
                setup,
                pointer: Operand::Reg(cast),
                size,
            })
        }
    }
}

fn serialize_call(protocol: &RuntimeProtocol, task: &Operand, index: u64, arg: &LoweredArg) -> Instr {
    Call::direct_void(
        protocol.serialize_arg,
        vec![
            task.clone(),
            Operand::Imm(Const::i64(index)),
            arg.pointer.clone(),
            Operand::Imm(Const::i64(arg.size)),
        ],
    )
    .into()
}

fn named_call(callee: Uuid, task: &Operand, kernel_name: &str) -> Instr {
    Call::direct_void(
        callee,
        vec![
            task.clone(),
            Operand::Imm(Const::Str(kernel_name.to_string())),
        ],
    )
    .into()
}

pub fn run(
    module: &mut Module,
    types: &TypeRegistry,
    layout: &DataLayout,
    classifier: &KernelClassifier<'_>,
    shape: LoweringShape,
) -> SyResult<LoweringReport> {
    let protocol = RuntimeProtocol::resolve(module, shape)?;
    match shape {
        LoweringShape::ReplaceBody => replace_bodies(module, types, layout, classifier, &protocol),
        LoweringShape::CallSites => rewrite_call_sites(module, types, layout, classifier, &protocol),
    }
}

fn replace_bodies(
    module: &mut Module,
    types: &TypeRegistry,
    layout: &DataLayout,
    classifier: &KernelClassifier<'_>,
    protocol: &RuntimeProtocol,
) -> SyResult<LoweringReport> {
    let kernels: Vec<Uuid> = module
        .functions
        .values()
        .filter(|f| !f.is_declaration() && classifier.is_kernel(f))
        .map(|f| f.uuid)
        .collect();

    let mut processed = 0usize;
    for uuid in kernels {
        let Some(function) = module.functions.get_mut(&uuid) else {
            continue;
        };
        let Some(task_param) = function.params.first() else {
            return Err(SyError::MissingTaskParameter {
                function: function.name.clone(),
            });
        };
        let task = Operand::Reg(task_param.name);
        // The launch call must carry whatever name is current; if the
        // partitioner already renamed this kernel, that is the short name.
        let kernel_name = function.name.clone();
        let mut next = function.next_available_name();

        let mut instructions = Vec::new();
        instructions.push(named_call(protocol.set_kernel, &task, &kernel_name));
        for (index, param) in function.params.iter().skip(1).enumerate() {
            let arg = lower_argument(types, layout, param.ty, Operand::Reg(param.name), &mut next)?;
            instructions.extend(arg.setup.iter().cloned());
            instructions.push(serialize_call(protocol, &task, index as u64, &arg));
        }
        instructions.push(named_call(protocol.launch_kernel, &task, &kernel_name));

        function.body.clear();
        function.body.insert(
            Label::NIL,
            BasicBlock {
                label: Label::NIL,
                name: None,
                instructions,
                terminator: Terminator::ret_void(),
            },
        );
        debug!(
            "kernel `{}` lowered in place ({} serialized arguments)",
            kernel_name,
            function.params.len().saturating_sub(1)
        );
        processed += 1;
    }

    info!("serialization lowering rewrote {} kernels", processed);
    Ok(LoweringReport { processed })
}

fn rewrite_call_sites(
    module: &mut Module,
    types: &TypeRegistry,
    layout: &DataLayout,
    classifier: &KernelClassifier<'_>,
    protocol: &RuntimeProtocol,
) -> SyResult<LoweringReport> {
    // Marker resolution already happened; this shape always has one.
    let Some(marker) = protocol.bind_marker else {
        return Err(SyError::MissingRuntimeSymbol {
            symbol: runtime::BIND_TASK_MARKER.to_string(),
        });
    };

    // Name and formal types of every kernel, gathered up front so host
    // functions can be rewritten without aliasing the kernel entries.
    let kernels: std::collections::BTreeMap<Uuid, (String, Vec<Typeref>)> = module
        .functions
        .values()
        .filter(|f| classifier.is_kernel(f))
        .map(|f| {
            (
                f.uuid,
                (f.name.clone(), f.params.iter().map(|p| p.ty).collect()),
            )
        })
        .collect();

    let hosts: Vec<Uuid> = module
        .functions
        .values()
        .filter(|f| !f.is_declaration() && !kernels.contains_key(&f.uuid))
        .map(|f| f.uuid)
        .collect();

    let mut processed = 0usize;
    for uuid in hosts {
        let Some(function) = module.functions.get_mut(&uuid) else {
            continue;
        };
        let host_name = function.name.clone();
        let mut next = function.next_available_name();

        for block in function.body.values_mut() {
            let old = std::mem::take(&mut block.instructions);
            let mut rewritten: Vec<Instr> = Vec::with_capacity(old.len());
            // Index (within `rewritten`) and task operand of the most
            // recent unconsumed marker of this block.
            let mut bound: Option<(usize, Operand)> = None;

            for instr in old {
                let callee = instr.as_direct_call();
                if callee == Some(marker) {
                    let task = match instr.try_as_call_ref().and_then(|c| c.args.first()) {
                        Some(task) => task.clone(),
                        None => {
                            return Err(SyError::TaskNotBound {
                                function: host_name.clone(),
                            });
                        }
                    };
                    bound = Some((rewritten.len(), task));
                    rewritten.push(instr);
                    continue;
                }

                let kernel = callee.and_then(|c| kernels.get(&c));
                let Some((kernel_name, formal_tys)) = kernel else {
                    rewritten.push(instr);
                    continue;
                };
                let Some((marker_at, task)) = bound.take() else {
                    return Err(SyError::TaskNotBound {
                        function: host_name.clone(),
                    });
                };
                let Some(call) = instr.try_as_call_ref() else {
                    rewritten.push(instr);
                    continue;
                };

                // The marker is consumed together with the call.
                rewritten.remove(marker_at);
                rewritten.push(named_call(protocol.set_kernel, &task, kernel_name));
                for (index, (actual, ty)) in call.args.iter().zip(formal_tys).enumerate() {
                    let arg = lower_argument(types, layout, *ty, actual.clone(), &mut next)?;
                    rewritten.extend(arg.setup.iter().cloned());
                    rewritten.push(serialize_call(protocol, &task, index as u64, &arg));
                }
                rewritten.push(named_call(protocol.launch_kernel, &task, kernel_name));
                debug!(
                    "call to `{}` in `{}` lowered to the launch protocol",
                    kernel_name, host_name
                );
                processed += 1;
            }

            block.instructions = rewritten;
        }
    }

    // Rewritten launches reference kernels by name string only, so a
    // lowered kernel definition is dead as a symbol and must not stay a
    // root for the external dead-code eliminator.
    for uuid in kernels.keys() {
        if let Some(function) = module.functions.get_mut(uuid)
            && !function.is_declaration()
        {
            debug!("kernel `{}` internalized after call-site lowering", function.name);
            function.linkage = Linkage::Internal;
        }
    }

    info!("serialization lowering rewrote {} call sites", processed);
    Ok(LoweringReport { processed })
}
