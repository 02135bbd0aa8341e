//! Common utilities and types shared across zstore

pub mod config;
pub mod error;
pub mod hash;
pub mod tracing_middleware;
pub mod utils;

pub use config::{BackendKind, Config};
pub use error::{Error, Result};
pub use hash::bucket_hash;
pub use tracing_middleware::{is_server_fault, request_tracing_middleware, REQUEST_ID_HEADER};
pub use utils::{format_bytes, percent_of};
