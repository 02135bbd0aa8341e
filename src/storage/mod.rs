//! Storage pools and the volumes carved out of them
//!
//! [`Pool`] and [`Volume`] are the only contract the HTTP layer relies on.
//! Implementations translate whatever their backend reports into the tagged
//! errors of [`crate::Error`]:
//!
//! - [`Error::NotExists`](crate::Error::NotExists) for a missing volume or a
//!   bucket that was never provisioned
//! - [`Error::AlreadyExists`](crate::Error::AlreadyExists) when a create
//!   targets a taken name
//! - [`Error::OutOfSpace`](crate::Error::OutOfSpace) when the pool cannot fit
//!   the requested size
//! - [`Error::Backend`](crate::Error::Backend) for everything else

pub mod memory;
pub mod slugs;
pub mod zfs;

use crate::common::Result;
use async_trait::async_trait;

pub use memory::MemoryPool;
pub use zfs::ZfsPool;

/// A storage pool from which volumes are created.
#[async_trait]
pub trait Pool: Send + Sync {
    /// Name of the pool; every volume name is rooted under it.
    fn name(&self) -> &str;

    /// Create a volume of `size` bytes at the full name `name`.
    ///
    /// Must fail with `AlreadyExists` rather than overwrite when the name is
    /// taken, even if a concurrent request created it after a probe.
    async fn create_volume(&self, name: &str, size: u64) -> Result<Box<dyn Volume>>;

    /// Fetch a volume by its full name.
    async fn volume(&self, name: &str) -> Result<Box<dyn Volume>>;

    /// List the volumes directly inside `bucket`.
    ///
    /// A provisioned bucket without volumes yields an empty list.
    async fn list_volumes(&self, bucket: &str) -> Result<Vec<Box<dyn Volume>>>;
}

/// A block storage volume allocated from a [`Pool`].
#[async_trait]
pub trait Volume: Send + Sync {
    /// Full name, including the pool.
    fn name(&self) -> &str;

    /// Size in bytes.
    fn size(&self) -> u64;

    /// Destroy this volume and anything beneath it.
    async fn destroy(&self) -> Result<()>;
}

impl std::fmt::Debug for dyn Volume {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Volume")
            .field("name", &self.name())
            .field("size", &self.size())
            .finish()
    }
}
