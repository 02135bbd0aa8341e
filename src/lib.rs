//! # zstore
//!
//! A block storage provisioning daemon. Clients ask for volumes over HTTP;
//! zstored carves them out of a single storage pool (a ZFS zpool in
//! production) and keeps every client in its own bucket:
//!
//! ```text
//!   client 10.0.0.7 ──► POST /v1/storage/disk1 {"size":"512M"}
//!                          │
//!                          ▼
//!               zstore/<blake3(10.0.0.7)>/disk1   (zvol, 512 MiB)
//! ```
//!
//! ## Usage
//!
//! ### Start the daemon
//! ```bash
//! zstored --pool zstore --bind 0.0.0.0:5000
//! zstored --backend memory            # no ZFS required
//! ```
//!
//! ### Talk to it
//! ```bash
//! curl -X POST -d '{"size":"1G"}' http://localhost:5000/v1/storage/disk1
//! curl http://localhost:5000/v1/storage/disk1
//! curl http://localhost:5000/v1/storage/
//! curl -X DELETE http://localhost:5000/v1/storage/disk1
//! ```

pub mod common;
pub mod storage;
pub mod zstored;

// Re-export commonly used types
pub use common::{Config, Error, Result};
pub use storage::{MemoryPool, Pool, Volume, ZfsPool};
pub use zstored::Daemon;

/// Current version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
