//! Per-client volume naming
//!
//! Every request is mapped onto a dataset name of the form
//! `pool/bucket/leaf`. The bucket is a hash of the client's address, so each
//! client only ever sees its own volumes; the leaf is the last segment of the
//! request path.

use crate::common::{bucket_hash, Error, Result};
use percent_encoding::percent_decode_str;

/// Shape of a derived name, by segment count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Depth {
    /// `pool/bucket`
    Bucket,
    /// `pool/bucket/leaf`
    Volume,
    /// Anything else; never reaches the pool.
    Other,
}

/// Full dataset name derived for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeName(String);

impl VolumeName {
    /// Join segments with `/`, dropping empty and `.` segments and letting
    /// `..` remove the segment before it.
    pub fn join(parts: &[&str]) -> Self {
        let mut segments: Vec<&str> = Vec::new();
        for part in parts {
            for segment in part.split('/') {
                match segment {
                    "" | "." => {}
                    ".." => {
                        segments.pop();
                    }
                    s => segments.push(s),
                }
            }
        }
        VolumeName(segments.join("/"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn segments(&self) -> usize {
        if self.0.is_empty() {
            0
        } else {
            self.0.split('/').count()
        }
    }

    pub fn depth(&self) -> Depth {
        match self.segments() {
            2 => Depth::Bucket,
            3 => Depth::Volume,
            _ => Depth::Other,
        }
    }
}

impl std::fmt::Display for VolumeName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Host part of a `host:port` or `[host]:port` address.
pub fn split_host_port(addr: &str) -> Result<&str> {
    let invalid = || Error::AddressParse(addr.to_string());

    let host = if let Some(rest) = addr.strip_prefix('[') {
        let (host, tail) = rest.split_once(']').ok_or_else(invalid)?;
        if !tail.starts_with(':') || tail[1..].contains(':') {
            return Err(invalid());
        }
        host
    } else {
        let (host, _port) = addr.rsplit_once(':').ok_or_else(invalid)?;
        if host.contains(':') {
            return Err(invalid());
        }
        host
    };

    if host.contains(['[', ']']) {
        return Err(invalid());
    }
    Ok(host)
}

/// Last path segment after `api_prefix`, percent-decoded. Empty when the
/// path is the prefix itself.
///
/// Fails with [`Error::InvalidName`] when the decoded path is not UTF-8.
pub fn leaf_name(request_path: &str, api_prefix: &str) -> Result<String> {
    let rest = request_path
        .strip_prefix(api_prefix)
        .unwrap_or(request_path);
    let decoded = percent_decode_str(rest)
        .decode_utf8()
        .map_err(|e| Error::InvalidName(format!("cannot decode {:?}: {}", rest, e)))?;

    Ok(decoded
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or("")
        .to_string())
}

/// Derive the dataset name a request refers to.
///
/// Fails with [`Error::AddressParse`] when `client_addr` has no port and
/// with [`Error::InvalidName`] when the path does not decode.
pub fn derive_name(
    pool: &str,
    client_addr: &str,
    request_path: &str,
    api_prefix: &str,
) -> Result<VolumeName> {
    let host = split_host_port(client_addr)?;
    let bucket = bucket_hash(host.as_bytes());
    let leaf = leaf_name(request_path, api_prefix)?;

    Ok(VolumeName::join(&[pool, &bucket, &leaf]))
}

/// Strip the pool from a full name, leaving `bucket/leaf`.
pub fn local_name<'a>(full: &'a str, pool: &str) -> &'a str {
    full.strip_prefix(pool)
        .and_then(|rest| rest.strip_prefix('/'))
        .unwrap_or(full)
}
