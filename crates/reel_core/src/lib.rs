//! REEL Core Types
//!
//! Pure types with no I/O: content hashes, identifiers, format versions,
//! and the shared error type.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod hash;
pub mod id;
pub mod version;

// Re-exports
pub use error::{CoreError, CoreResult};
pub use hash::{Hash, HashError};
pub use id::{SessionId, StepId};
pub use version::{SESSION_FORMAT_VERSION, Version, VersionError};
