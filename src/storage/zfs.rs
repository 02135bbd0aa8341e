//! ZFS-backed pool
//!
//! Volumes are zvols created under a zpool by shelling out to the `zfs` and
//! `zpool` tools. Their diagnostics are matched once, in [`classify_stderr`],
//! and leave this module only as tagged [`Error`] values.

use crate::common::{Error, Result};
use crate::storage::{Pool, Volume};
use async_trait::async_trait;
use tokio::process::Command;

const ZFS: &str = "zfs";
const ZPOOL: &str = "zpool";

/// ZFS control device, present once the kernel module is loaded
pub const DEV_ZFS: &str = "/dev/zfs";

/// Columns requested from `zfs list`
const DATASET_COLUMNS: &str = "name,type,volsize";

/// Health reported by `zpool list` for a usable pool
pub const ZPOOL_ONLINE: &str = "ONLINE";

/// Is the ZFS kernel module loaded on this host?
#[cfg(any(target_os = "linux", target_os = "freebsd"))]
pub fn is_enabled() -> Result<bool> {
    match std::fs::metadata(std::path::Path::new(DEV_ZFS)) {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Is the ZFS kernel module loaded on this host?
#[cfg(not(any(target_os = "linux", target_os = "freebsd")))]
pub fn is_enabled() -> Result<bool> {
    Err(Error::ZfsUnavailable(format!(
        "zstore does not run on {}",
        std::env::consts::OS
    )))
}

/// Map `zfs`/`zpool` stderr onto the pool error tags.
pub fn classify_stderr(stderr: &str) -> Error {
    let stderr = stderr.trim();
    if stderr.contains("dataset does not exist") || stderr.contains("no such pool") {
        Error::NotExists
    } else if stderr.contains("out of space") {
        Error::OutOfSpace
    } else if stderr.contains("already exists") {
        Error::AlreadyExists
    } else if stderr.contains("Permission denied") {
        Error::Backend(format!("permission denied to ZFS device: {}", stderr))
    } else if stderr.is_empty() {
        Error::Backend("zfs command failed without diagnostics".into())
    } else {
        Error::Backend(stderr.to_string())
    }
}

async fn run(program: &str, args: &[&str]) -> Result<String> {
    tracing::trace!(program, ?args, "running zfs command");

    let output = Command::new(program)
        .args(args)
        .output()
        .await
        .map_err(|e| Error::Backend(format!("failed to run {}: {}", program, e)))?;

    if !output.status.success() {
        return Err(classify_stderr(&String::from_utf8_lossy(&output.stderr)));
    }

    String::from_utf8(output.stdout)
        .map_err(|e| Error::Backend(format!("{} produced invalid UTF-8: {}", program, e)))
}

/// One row of `zfs list -H -p -o name,type,volsize`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dataset {
    pub name: String,
    pub kind: String,
    pub volsize: Option<u64>,
}

impl Dataset {
    pub fn is_volume(&self) -> bool {
        self.kind == "volume"
    }
}

/// Parse a tab-separated `zfs list` row.
pub fn parse_dataset_line(line: &str) -> Result<Dataset> {
    let mut fields = line.split('\t');
    let (Some(name), Some(kind), Some(volsize)) = (fields.next(), fields.next(), fields.next())
    else {
        return Err(Error::Backend(format!("unexpected zfs list output: {:?}", line)));
    };

    // Filesystems report "-" for volsize.
    let volsize = match volsize {
        "-" => None,
        raw => Some(
            raw.parse::<u64>()
                .map_err(|e| Error::Backend(format!("bad volsize {:?}: {}", raw, e)))?,
        ),
    };

    Ok(Dataset {
        name: name.to_string(),
        kind: kind.to_string(),
        volsize,
    })
}

fn parse_datasets(output: &str) -> Result<Vec<Dataset>> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(parse_dataset_line)
        .collect()
}

/// Capacity and health of a zpool, from `zpool list`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolStats {
    pub name: String,
    pub size: u64,
    pub allocated: u64,
    pub health: String,
}

impl PoolStats {
    pub fn ensure_online(&self) -> Result<()> {
        if self.health == ZPOOL_ONLINE {
            Ok(())
        } else {
            Err(Error::PoolUnhealthy {
                name: self.name.clone(),
                health: self.health.clone(),
            })
        }
    }
}

/// Parse a tab-separated `zpool list -H -p -o name,size,allocated,health` row.
pub fn parse_pool_line(line: &str) -> Result<PoolStats> {
    let fields: Vec<&str> = line.trim_end().split('\t').collect();
    let [name, size, allocated, health] = fields.as_slice() else {
        return Err(Error::Backend(format!("unexpected zpool list output: {:?}", line)));
    };

    let number = |raw: &str| {
        raw.parse::<u64>()
            .map_err(|e| Error::Backend(format!("bad zpool number {:?}: {}", raw, e)))
    };

    Ok(PoolStats {
        name: name.to_string(),
        size: number(*size)?,
        allocated: number(*allocated)?,
        health: health.to_string(),
    })
}

/// A zpool from which zvols are created.
#[derive(Debug, Clone)]
pub struct ZfsPool {
    name: String,
}

impl ZfsPool {
    /// Attach to an existing zpool. Building one is left to the operator.
    pub async fn attach(name: &str) -> Result<(Self, PoolStats)> {
        let stats = Self::stats_for(name).await?;
        Ok((
            Self {
                name: name.to_string(),
            },
            stats,
        ))
    }

    async fn stats_for(name: &str) -> Result<PoolStats> {
        let output = run(
            ZPOOL,
            &["list", "-H", "-p", "-o", "name,size,allocated,health", name],
        )
        .await?;

        let line = output
            .lines()
            .next()
            .ok_or_else(|| Error::Backend(format!("zpool list returned nothing for {}", name)))?;
        parse_pool_line(line)
    }

    async fn list(&self, args: &[&str]) -> Result<Vec<Dataset>> {
        let mut full = vec!["list", "-H", "-p", "-o", DATASET_COLUMNS];
        full.extend_from_slice(args);
        parse_datasets(&run(ZFS, &full).await?)
    }
}

#[async_trait]
impl Pool for ZfsPool {
    fn name(&self) -> &str {
        &self.name
    }

    async fn create_volume(&self, name: &str, size: u64) -> Result<Box<dyn Volume>> {
        let size_arg = size.to_string();
        run(ZFS, &["create", "-p", "-V", &size_arg, name]).await?;
        tracing::info!(volume = %name, size, "created zvol");

        // Report the size ZFS settled on, which may be rounded up.
        Ok(created_volume(name, size, self.volume(name).await))
    }

    async fn volume(&self, name: &str) -> Result<Box<dyn Volume>> {
        let datasets = self.list(&[name]).await?;
        let dataset = datasets
            .into_iter()
            .find(|d| d.name == name)
            .ok_or(Error::NotExists)?;

        // A filesystem at this name is not a volume as far as clients care.
        if !dataset.is_volume() {
            return Err(Error::NotExists);
        }

        Ok(Box::new(ZfsVolume::from_dataset(dataset)))
    }

    async fn list_volumes(&self, bucket: &str) -> Result<Vec<Box<dyn Volume>>> {
        let datasets = self.list(&["-d", "1", "-t", "volume", bucket]).await?;

        Ok(datasets
            .into_iter()
            .filter(|d| d.is_volume() && d.name != bucket)
            .map(|d| Box::new(ZfsVolume::from_dataset(d)) as Box<dyn Volume>)
            .collect())
    }
}

/// Handle for a zvol `zfs create` just made. Falls back to the requested
/// size when the zvol cannot be listed again.
fn created_volume(name: &str, size: u64, listed: Result<Box<dyn Volume>>) -> Box<dyn Volume> {
    match listed {
        Ok(volume) => volume,
        Err(e) => {
            tracing::warn!(volume = %name, error = %e, "zvol created but could not be re-read");
            Box::new(ZfsVolume {
                name: name.to_string(),
                size,
            })
        }
    }
}

/// A zvol inside a [`ZfsPool`].
#[derive(Debug, Clone)]
pub struct ZfsVolume {
    name: String,
    size: u64,
}

impl ZfsVolume {
    fn from_dataset(dataset: Dataset) -> Self {
        Self {
            size: dataset.volsize.unwrap_or(0),
            name: dataset.name,
        }
    }
}

#[async_trait]
impl Volume for ZfsVolume {
    fn name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> u64 {
        self.size
    }

    async fn destroy(&self) -> Result<()> {
        run(ZFS, &["destroy", "-r", &self.name]).await?;
        tracing::info!(volume = %self.name, "destroyed zvol");
        Ok(())
    }
}
