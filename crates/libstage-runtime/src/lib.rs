//! Dynamic loader backends for libstage.
//!
//! This crate implements the boundary to the platform's dynamic linker: the
//! `DynamicLoader` trait with its two primitives (load by absolute path, load
//! by logical name through the system search path), a `NativeLoader` backed by
//! `libloading` that keeps every loaded library resident, and a `MockLoader`
//! that records attempts and injects link failures for tests.

pub mod backend;
pub mod mock;
pub mod native;

pub use backend::{select_backend, DynamicLoader};
pub use mock::{LoadAttempt, MockLoader};
pub use native::NativeLoader;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("failed to load '{target}': {message}")]
    Link { target: String, message: String },
    #[error("loader backend '{0}' is not available on this system")]
    BackendUnavailable(String),
}

impl RuntimeError {
    pub fn link(target: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Link {
            target: target.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_error_display_includes_target_and_message() {
        let e = RuntimeError::link("/tmp/x/libtbb.so", "undefined symbol: foo");
        let msg = e.to_string();
        assert!(msg.contains("/tmp/x/libtbb.so"));
        assert!(msg.contains("undefined symbol: foo"));
    }

    #[test]
    fn backend_unavailable_display() {
        let e = RuntimeError::BackendUnavailable("quantum".to_owned());
        assert!(e.to_string().contains("quantum"));
    }
}
