//! zstored: the provisioning daemon
//!
//! - `naming`: per-client dataset names
//! - `http`: request routing and the volume lifecycle
//! - `server`: backend attach, serving, shutdown

pub mod http;
pub mod naming;
pub mod server;

pub use http::{create_router, StorageState};
pub use server::Daemon;
