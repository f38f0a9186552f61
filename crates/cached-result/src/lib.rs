//! # cached-result
//!
//! Transparent result caching for functions, methods and computed
//! attributes.
//!
//! ## Architecture
//! - **CachedFunction**: memo → persistent backend → target, storing fresh
//!   results in every enabled layer
//! - **CachedProperty**: the same protocol behind read/write/delete
//!   accessors; writes and deletes invalidate
//! - **Keys**: generated from module, type and function name plus an
//!   optional id, or given explicitly as a template or function; SHA-256
//!   hashed by default
//! - **Backend**: any [`cached_result_store::CacheBackend`]; the global
//!   in-memory backend unless one is supplied

#![warn(missing_docs)]

mod args;
mod error;
mod function;
mod instance;
mod key;
mod memo;
mod options;
mod property;
mod stats;
mod template;

pub use args::Args;
pub use error::{AttributeOp, Error, Result};
pub use function::{Bound, CachedFunction};
pub use instance::{Instance, InstanceId};
pub use key::{HashAlgorithm, KeySpec, KEY_SEPARATOR};
pub use options::CacheOptions;
pub use property::{CachedProperty, Capability, ComputedAttribute};
pub use stats::CallStats;
pub use template::{Template, TemplateError};
