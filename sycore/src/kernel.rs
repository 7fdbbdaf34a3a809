//! Kernel classification.
//!
//! Whether a function is a kernel is encoded only in its symbol name: the
//! front end instantiates every kernel through one dedicated template, so
//! the demangled signature of a kernel starts with a fixed marker. This
//! module is the only place in the pipeline that looks at name strings for
//! classification; everything downstream consumes the predicate.
use log::trace;
use syinstr::modules::Function;

/// Start of the demangled signature of every kernel instantiation.
pub const KERNEL_MARKER: &str = "void cl::sycl::detail::instantiate_kernel<";

/// Prefix of canonical short kernel names handed out by the registry.
///
/// Once the visibility partitioner has renamed a kernel, this prefix is the
/// fast path that avoids demangling it again.
pub const KERNEL_SHORT_PREFIX: &str = "TRISYCL_kernel_";

/// Name-demangling service.
///
/// Implementations turn a linker-level symbol into a human-readable
/// signature. Failure is not an error; it simply means the symbol does not
/// demangle, which the classifier treats as "not a kernel".
pub trait Demangler {
    fn demangle(&self, mangled: &str) -> Option<String>;
}

/// The kernel predicate.
///
/// Safe to call on declarations; has no side effects.
pub struct KernelClassifier<'a> {
    demangler: &'a dyn Demangler,
}

impl<'a> KernelClassifier<'a> {
    pub fn new(demangler: &'a dyn Demangler) -> Self {
        KernelClassifier { demangler }
    }

    /// True if `function` is a kernel, by current short name or by
    /// demangled signature.
    pub fn is_kernel(&self, function: &Function) -> bool {
        self.is_kernel_name(&function.name)
    }

    pub fn is_kernel_name(&self, name: &str) -> bool {
        if name.starts_with(KERNEL_SHORT_PREFIX) {
            return true;
        }
        match self.demangler.demangle(name) {
            Some(signature) => signature.starts_with(KERNEL_MARKER),
            None => {
                trace!("`{}` does not demangle; classified as not a kernel", name);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests_utils::{MapDemangler, plain_function};

    #[test]
    fn demangled_marker_identifies_a_kernel() {
        let demangler = MapDemangler::new(&[(
            "_Z6kernelv",
            "void cl::sycl::detail::instantiate_kernel<add_ints>()",
        )]);
        let classifier = KernelClassifier::new(&demangler);
        assert!(classifier.is_kernel(&plain_function("_Z6kernelv")));
        assert!(!classifier.is_kernel(&plain_function("_Z4mainv")));
    }

    #[test]
    fn short_prefix_skips_the_demangler() {
        // No mapping at all: the short name must still classify positive.
        let demangler = MapDemangler::new(&[]);
        let classifier = KernelClassifier::new(&demangler);
        assert!(classifier.is_kernel(&plain_function("TRISYCL_kernel_7")));
    }

    #[test]
    fn demangling_failure_is_a_soft_miss() {
        let demangler = MapDemangler::new(&[]);
        let classifier = KernelClassifier::new(&demangler);
        assert!(!classifier.is_kernel(&plain_function("not_mangled$at$all")));
    }
}
