use strum::EnumIs;
use thiserror::Error;
use uuid::Uuid;

use crate::types::Typeref;

#[derive(Debug, PartialEq, Eq, EnumIs, Error)]
pub enum Error {
    /// No basic block with the entrypoint label was found.
    #[error(
        "By convention, the entrypoint basic block of function `{function}` must have label `block_0`. No such basic block was found."
    )]
    MissingEntryBlock { function: String },

    /// A call refers to a function that is not part of the module.
    #[error(
        "An instruction of function `{function}` refers to a callee `{undefined}` that is not defined within the module."
    )]
    UndefinedFunction { function: String, undefined: Uuid },

    /// A terminator targets a label with no basic block behind it.
    #[error(
        "A terminator of function `{function}` branches to label `{label}` which names no basic block."
    )]
    UndefinedLabel {
        function: String,
        label: crate::modules::operand::Label,
    },

    /// A typeref does not resolve against the registry it was queried with.
    #[error("The typeref `{typeref}` is not registered in the type registry.")]
    UnknownType { typeref: u32 },

    /// A global alias points at a global that is not part of the module.
    #[error("The alias `{alias}` refers to an aliasee `{undefined}` that is not defined within the module.")]
    UndefinedAliasee { alias: String, undefined: Uuid },
}

impl Error {
    pub(crate) fn unknown_type(typeref: Typeref) -> Self {
        Error::UnknownType {
            typeref: typeref.raw(),
        }
    }
}
