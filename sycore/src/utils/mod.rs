pub mod error;

pub use error::{SyError, SyResult};
