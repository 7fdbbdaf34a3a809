use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyError {
    /// A runtime protocol entry point is not declared in the module being
    /// lowered. The module cannot be linked against the device runtime.
    #[error("The runtime entry point `{symbol}` is absent from the module.")]
    MissingRuntimeSymbol { symbol: String },

    /// A kernel lowered in place must receive the runtime task handle as
    /// its first formal parameter.
    #[error("The kernel `{function}` carries no task-handle parameter.")]
    MissingTaskParameter { function: String },

    /// A kernel call site was reached with no task bound in its block.
    #[error(
        "A call to a kernel inside `{function}` is not preceded by a task-binding marker in the same basic block."
    )]
    TaskNotBound { function: String },

    #[error(transparent)]
    Ir(#[from] syinstr::utils::Error),
}

pub type SyResult<T> = Result<T, SyError>;
