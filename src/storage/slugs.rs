//! Size slug catalog
//!
//! Volume sizes are chosen from a fixed table of labels such as `256M` or
//! `4G`. Client-supplied strings are only ever checked with [`resolve`]; the
//! ordering helpers assume well-formed slugs and panic otherwise, since the
//! catalog is hand-authored.

use std::cmp::Ordering;

pub const MB: u64 = 1024 * 1024;
pub const GB: u64 = 1024 * MB;

/// Available slugs and their sizes in bytes
const CATALOG: &[(&str, u64)] = &[
    ("256M", 256 * MB),
    ("512M", 512 * MB),
    ("1G", GB),
    ("2G", 2 * GB),
    ("4G", 4 * GB),
    ("8G", 8 * GB),
];

/// Byte suffixes, smallest first
const SUFFIX_PRECEDENCE: &[char] = &['B', 'K', 'M', 'G', 'T', 'P', 'E', 'Z', 'Y'];

/// Look up the size in bytes of an exact catalog slug.
pub fn resolve(slug: &str) -> Option<u64> {
    CATALOG
        .iter()
        .find(|(name, _)| *name == slug)
        .map(|(_, size)| *size)
}

/// Every catalog slug, smallest first.
pub fn all_slugs_ordered() -> Vec<&'static str> {
    let mut slugs: Vec<&'static str> = CATALOG.iter().map(|(name, _)| *name).collect();
    slugs.sort_by(|a, b| compare_slugs(a, b));
    slugs
}

/// Order two slugs by byte suffix, then by their integer magnitude.
///
/// # Panics
///
/// Panics if either slug lacks a known suffix or a numeric magnitude.
pub fn compare_slugs(a: &str, b: &str) -> Ordering {
    let (a_precedence, a_value) = split_slug(a);
    let (b_precedence, b_value) = split_slug(b);

    a_precedence
        .cmp(&b_precedence)
        .then_with(|| a_value.cmp(&b_value))
}

fn split_slug(slug: &str) -> (usize, u64) {
    let Some(suffix) = slug.chars().last() else {
        panic!("empty size slug");
    };

    let Some(precedence) = SUFFIX_PRECEDENCE.iter().position(|s| *s == suffix) else {
        panic!("unknown size slug suffix in {:?}", slug);
    };

    let digits = &slug[..slug.len() - suffix.len_utf8()];
    match digits.parse::<u64>() {
        Ok(value) => (precedence, value),
        Err(e) => panic!("invalid size slug magnitude in {:?}: {}", slug, e),
    }
}
