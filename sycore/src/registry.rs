//! Kernel naming registry.
//!
//! Assigns each kernel a dense zero-based ID in first-seen order and
//! derives the canonical short symbol from it. The registry lives for the
//! whole build session and is threaded by reference through every module
//! pass, so a kernel re-processed in a later module keeps its ID.
use std::collections::BTreeMap;

use log::debug;

use crate::kernel::KERNEL_SHORT_PREFIX;

/// Session-scoped long-name to ID table.
///
/// IDs are append-only: registration is idempotent and an ID is never
/// reused, even if the kernel later disappears from the module.
#[derive(Debug, Default)]
pub struct KernelRegistry {
    ids: BTreeMap<String, u32>,
    next_id: u32,
}

impl KernelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `long_name`, returning its ID. Registering a known name
    /// returns the existing ID without advancing the counter.
    pub fn register(&mut self, long_name: &str) -> u32 {
        if let Some(id) = self.ids.get(long_name) {
            return *id;
        }
        let id = self.next_id;
        self.next_id += 1;
        self.ids.insert(long_name.to_string(), id);
        debug!("kernel `{}` registered with id {}", long_name, id);
        id
    }

    /// The canonical short symbol for `id`.
    pub fn short_name(&self, id: u32) -> String {
        format!("{}{}", KERNEL_SHORT_PREFIX, id)
    }

    /// Register `long_name` and return its short symbol in one step.
    pub fn register_and_short_name(&mut self, long_name: &str) -> String {
        let id = self.register(long_name);
        self.short_name(id)
    }

    /// Number of distinct kernels seen so far.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
