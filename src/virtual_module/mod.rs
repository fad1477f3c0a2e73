//! Virtual modules backed by compiler artifacts.
//!
//! `virtual:shadow-cljs/<build>[/<module>]` resolves to the artifact of that
//! build, re-exported through a small wrapper. Loads wait for the compiler
//! when the artifact is not there yet.

mod id;
mod resolver;
mod wrapper;

#[cfg(test)]
mod tests;

pub use id::{
    RESOLVED_MARKER, VIRTUAL_PREFIX, VirtualModuleId, is_resolved_virtual_module,
    is_virtual_module,
};
pub use resolver::{HotUpdateDecision, VirtualModuleResolver};
pub use wrapper::{SELF_ACCEPT_HOOK, build_wrapper, has_default_export};
