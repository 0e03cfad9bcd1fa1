//! Engine-owned result handles and their scoped release.
//!
//! `compile` and `compute_witness` return handles rather than plain values:
//! the engine keeps the result behind a resource that must be released
//! exactly once. Fields may be extracted any number of times before release.
//!
//! [`Scoped`] owns a handle for the duration of one pipeline operation and
//! releases it when dropped, so release happens on the normal path and on
//! every early return through `?`. Releasing consumes the wrapper, so no
//! extraction can follow it.

use serde_json::Value;

use crate::artifacts::Abi;
use crate::error::{ProviderError, Result};

/// A native resource with a single, terminal release operation.
///
/// Release is not required to be idempotent. Callers must invoke it at most
/// once; [`Scoped`] guarantees exactly once.
pub trait EngineHandle {
    fn release(&mut self);
}

/// Result of the engine's compile entry point.
pub trait CompileHandle: EngineHandle {
    fn program(&self) -> Result<Vec<u8>>;
    fn abi(&self) -> Result<Abi>;
    /// Only meaningful when snarkjs output was requested.
    fn snarkjs_program(&self) -> Result<Vec<u8>>;
}

/// Result of the engine's witness entry point.
pub trait WitnessHandle: EngineHandle {
    fn witness(&self) -> Result<Vec<u8>>;
    fn output(&self) -> Result<Value>;
    /// Only meaningful when snarkjs output was requested.
    fn snarkjs_witness(&self) -> Result<Vec<u8>>;
}

/// Owns a handle for one operation and releases it exactly once.
pub struct Scoped<H: EngineHandle> {
    operation: &'static str,
    handle: Option<H>,
}

impl<H: EngineHandle> Scoped<H> {
    pub fn new(operation: &'static str, handle: H) -> Self {
        Self {
            operation,
            handle: Some(handle),
        }
    }

    /// Read one field, tagging failures with the operation and field name.
    pub fn extract<T>(&self, field: &'static str, read: impl FnOnce(&H) -> Result<T>) -> Result<T> {
        let handle = self.handle.as_ref().ok_or_else(|| ProviderError::Resource {
            operation: self.operation,
            detail: format!("`{field}` read after release"),
        })?;
        read(handle).map_err(|source| ProviderError::Extraction {
            operation: self.operation,
            field,
            source: Box::new(source),
        })
    }

    /// Release now rather than at end of scope.
    pub fn release(mut self) {
        self.release_once();
    }

    fn release_once(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            tracing::trace!(operation = self.operation, "releasing engine handle");
            handle.release();
        }
    }
}

impl<H: EngineHandle> Drop for Scoped<H> {
    fn drop(&mut self) {
        self.release_once();
    }
}
