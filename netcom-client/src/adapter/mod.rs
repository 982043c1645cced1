//! Disposable front-ends over the typed wrappers.
//!
//! Each adapter owns exactly one wrapper and is either live or disposed.
//! Live accessors always make a fresh call; nothing is cached except the
//! identifier used for equality and hashing, which is read once at
//! construction. Disposing releases the wrapper; any later accessor fails
//! with [`ComError::UseAfterDispose`]. Disposing twice is a no-op.

mod association;
mod connection;
mod network;

pub use association::FileAssociation;
pub use connection::NetworkConnectionInfo;
pub use network::NetworkInfo;

use crate::error::{ComError, ComResult};

/// Live/disposed state shared by the adapters.
#[derive(Debug)]
struct Lifecycle<T> {
    inner: Option<T>,
    object: &'static str,
}

impl<T> Lifecycle<T> {
    const fn new(inner: T, object: &'static str) -> Self {
        Self {
            inner: Some(inner),
            object,
        }
    }

    fn get(&self) -> ComResult<&T> {
        self.inner.as_ref().ok_or(ComError::UseAfterDispose {
            object: self.object,
        })
    }

    fn dispose(&mut self) {
        if let Some(inner) = self.inner.take() {
            drop(inner);
            tracing::trace!(object = self.object, "disposed");
        }
    }

    const fn is_disposed(&self) -> bool {
        self.inner.is_none()
    }
}
