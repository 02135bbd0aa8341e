//! In-memory pool
//!
//! Keeps volume names and sizes in a map guarded by a mutex. Used by the test
//! suite and by `zstored --backend memory` on hosts without ZFS. Nothing is
//! allocated; the capacity only drives out-of-space answers.

use crate::common::{Error, Result};
use crate::storage::{Pool, Volume};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct State {
    /// Full volume name -> size in bytes
    volumes: BTreeMap<String, u64>,
    /// Datasets created implicitly as parents of volumes
    buckets: BTreeSet<String>,
    capacity: u64,
    used: u64,
}

/// Pool held entirely in memory.
#[derive(Debug, Clone)]
pub struct MemoryPool {
    name: String,
    state: Arc<Mutex<State>>,
}

impl MemoryPool {
    pub fn new(name: impl Into<String>, capacity: u64) -> Self {
        Self {
            name: name.into(),
            state: Arc::new(Mutex::new(State {
                capacity,
                ..Default::default()
            })),
        }
    }

    /// Bytes currently allocated to volumes.
    pub fn used(&self) -> Result<u64> {
        Ok(lock(&self.state)?.used)
    }

    /// Mark a bucket as provisioned without creating a volume in it.
    pub fn provision_bucket(&self, bucket: &str) -> Result<()> {
        self.check_owned(bucket)?;
        let mut state = lock(&self.state)?;
        provision_parents(&mut state, &self.name, &format!("{}/", bucket));
        Ok(())
    }

    fn check_owned(&self, name: &str) -> Result<()> {
        match name.strip_prefix(&self.name) {
            Some(rest) if rest.starts_with('/') && rest.len() > 1 => Ok(()),
            _ => Err(Error::Backend(format!(
                "{:?} is not a dataset of pool {:?}",
                name, self.name
            ))),
        }
    }
}

fn lock(state: &Mutex<State>) -> Result<MutexGuard<'_, State>> {
    state
        .lock()
        .map_err(|_| Error::Backend("memory pool lock poisoned".into()))
}

/// Record every ancestor of `name` below the pool root as a bucket.
fn provision_parents(state: &mut State, pool: &str, name: &str) {
    let mut parent = name;
    while let Some((head, _)) = parent.rsplit_once('/') {
        if head == pool || head.is_empty() {
            break;
        }
        state.buckets.insert(head.to_string());
        parent = head;
    }
}

#[async_trait]
impl Pool for MemoryPool {
    fn name(&self) -> &str {
        &self.name
    }

    async fn create_volume(&self, name: &str, size: u64) -> Result<Box<dyn Volume>> {
        self.check_owned(name)?;
        let mut state = lock(&self.state)?;

        if state.volumes.contains_key(name) || state.buckets.contains(name) {
            return Err(Error::AlreadyExists);
        }

        let remaining = state.capacity.saturating_sub(state.used);
        if size > remaining {
            return Err(Error::OutOfSpace);
        }

        state.volumes.insert(name.to_string(), size);
        state.used += size;
        provision_parents(&mut state, &self.name, name);

        tracing::debug!(volume = %name, size, "memory pool: created volume");

        Ok(Box::new(MemoryVolume {
            name: name.to_string(),
            size,
            state: self.state.clone(),
        }))
    }

    async fn volume(&self, name: &str) -> Result<Box<dyn Volume>> {
        let state = lock(&self.state)?;
        let size = *state.volumes.get(name).ok_or(Error::NotExists)?;

        Ok(Box::new(MemoryVolume {
            name: name.to_string(),
            size,
            state: self.state.clone(),
        }))
    }

    async fn list_volumes(&self, bucket: &str) -> Result<Vec<Box<dyn Volume>>> {
        let state = lock(&self.state)?;
        if !state.buckets.contains(bucket) {
            return Err(Error::NotExists);
        }

        let volumes = state
            .volumes
            .iter()
            .filter(|(name, _)| {
                name.rsplit_once('/')
                    .map(|(parent, _)| parent == bucket)
                    .unwrap_or(false)
            })
            .map(|(name, size)| {
                Box::new(MemoryVolume {
                    name: name.clone(),
                    size: *size,
                    state: self.state.clone(),
                }) as Box<dyn Volume>
            })
            .collect();

        Ok(volumes)
    }
}

/// Volume handle into a [`MemoryPool`].
#[derive(Debug)]
pub struct MemoryVolume {
    name: String,
    size: u64,
    state: Arc<Mutex<State>>,
}

#[async_trait]
impl Volume for MemoryVolume {
    fn name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> u64 {
        self.size
    }

    async fn destroy(&self) -> Result<()> {
        let mut state = lock(&self.state)?;

        let freed = state.volumes.remove(&self.name).ok_or(Error::NotExists)?;

        let prefix = format!("{}/", self.name);
        let descendants: Vec<String> = state
            .volumes
            .keys()
            .filter(|name| name.starts_with(&prefix))
            .cloned()
            .collect();

        let mut released = freed;
        for name in descendants {
            if let Some(size) = state.volumes.remove(&name) {
                released += size;
            }
        }
        state.buckets.retain(|bucket| !bucket.starts_with(&prefix));
        state.used = state.used.saturating_sub(released);

        tracing::debug!(volume = %self.name, released, "memory pool: destroyed volume");
        Ok(())
    }
}
