//! Chunk naming and discovery
//!
//! A chunk is named `<prefix><suffix>`, where the suffix is a decimal index
//! in the widening scheme of `split -d`: `00`..`89`, then `9000`..`9899`,
//! then `990000`..`998999`, and so on. Every tier starts with one more `9`
//! than the last, so filename order equals write order and the suffix space
//! never runs out.

use splitvault_core::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Digits in the suffix of the first chunk
pub const FIRST_SUFFIX_DIGITS: usize = 2;

/// Suffix of chunk `index`
///
/// Tier `k` holds `9 * 10^(k+1)` chunks named `k` nines followed by `k + 2`
/// digits.
pub fn chunk_suffix(index: u64) -> String {
    let mut nines = 0;
    let mut offset: u64 = 0;
    let mut tier_len: u64 = 90;

    while index - offset >= tier_len {
        offset += tier_len;
        tier_len = tier_len.saturating_mul(10);
        nines += 1;
    }

    format!(
        "{}{:0width$}",
        "9".repeat(nines),
        index - offset,
        width = nines + FIRST_SUFFIX_DIGITS
    )
}

/// File name of chunk `index`
pub fn chunk_name(prefix: &str, index: u64) -> String {
    format!("{}{}", prefix, chunk_suffix(index))
}

/// Index encoded by a chunk suffix, if it is one
pub fn parse_suffix(suffix: &str) -> Option<u64> {
    if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let nines = suffix.bytes().take_while(|b| *b == b'9').count();
    if suffix.len() != 2 * nines + FIRST_SUFFIX_DIGITS {
        return None;
    }

    let offset = 10u64.checked_pow(nines as u32 + 1)? - 10;
    let within: u64 = suffix[nines..].parse().ok()?;
    offset.checked_add(within)
}

/// Number of chunks a stream of `len` bytes splits into
pub fn expected_chunk_count(len: u64, chunk_size: u64) -> u64 {
    if chunk_size == 0 {
        return 0;
    }
    len.div_ceil(chunk_size)
}

/// An ordered set of chunk files sharing one prefix
#[derive(Debug, Clone)]
pub struct ChunkSet {
    dir: PathBuf,
    prefix: String,
    chunks: Vec<PathBuf>,
}

impl ChunkSet {
    /// Discover the chunk set that makes up directory `dir`
    ///
    /// Every regular, non-hidden file must be a chunk of one common prefix,
    /// and the indices must run from 0 without gaps. The prefix is read off
    /// the first chunk, whose suffix is `00`. Modification times are ignored.
    ///
    /// # Errors
    ///
    /// Returns `ChunkSet` for an empty directory, a foreign file, mixed
    /// prefixes or a missing chunk.
    pub fn discover(dir: &Path) -> Result<Self> {
        let mut names: Vec<(String, PathBuf)> = Vec::new();

        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                return Err(Error::chunk_set(format!(
                    "{} is not a chunk file (name is not UTF-8)",
                    entry.path().display()
                )));
            };

            if name.starts_with('.') {
                tracing::debug!("Skipping hidden file {}", name);
                continue;
            }

            let path = entry.path();
            if !fs::metadata(&path)?.is_file() {
                return Err(Error::chunk_set(format!(
                    "{} is not a regular file",
                    path.display()
                )));
            }

            names.push((name.to_string(), path));
        }

        let Some(first) = names.iter().map(|(name, _)| name.as_str()).min() else {
            return Err(Error::chunk_set(format!(
                "no chunk files found in {}",
                dir.display()
            )));
        };

        let first_suffix = chunk_suffix(0);
        let prefix = match first.strip_suffix(first_suffix.as_str()) {
            Some(prefix) if !prefix.is_empty() => prefix.to_string(),
            _ => {
                return Err(Error::chunk_set(format!(
                    "{} is not the first chunk of a set (expected a name ending in {})",
                    first, first_suffix
                )))
            }
        };

        for (name, _) in &names {
            let index = name
                .strip_prefix(prefix.as_str())
                .and_then(parse_suffix);
            if index.is_none() {
                return Err(Error::chunk_set(format!(
                    "{} is not a chunk of {} in {}",
                    name,
                    prefix,
                    dir.display()
                )));
            }
        }

        let set = Self::from_found(dir, prefix, names);
        set.check_sequence()?;
        Ok(set)
    }

    /// Collect the chunks written for `pattern` (`<dir>/<prefix>`)
    ///
    /// Only files named `<prefix><suffix>` are included; other files in the
    /// directory are ignored. The result may be empty.
    pub fn for_prefix(pattern: &Path) -> Result<Self> {
        let (dir, prefix) = split_pattern(pattern)?;
        let mut found = Vec::new();

        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };

            let is_chunk = name
                .strip_prefix(prefix.as_str())
                .and_then(parse_suffix)
                .is_some();
            if is_chunk && entry.path().is_file() {
                found.push((name.to_string(), entry.path()));
            }
        }

        Ok(Self::from_found(&dir, prefix, found))
    }

    fn from_found(dir: &Path, prefix: String, mut found: Vec<(String, PathBuf)>) -> Self {
        // filename order is the contract
        found.sort_by(|a, b| a.0.cmp(&b.0));

        Self {
            dir: dir.to_path_buf(),
            prefix,
            chunks: found.into_iter().map(|(_, path)| path).collect(),
        }
    }

    /// Verify the indices run 0, 1, 2, ... without gaps
    pub fn check_sequence(&self) -> Result<()> {
        for (expected, path) in self.chunks.iter().enumerate() {
            let expected_name = chunk_name(&self.prefix, expected as u64);
            let actual = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();

            if actual != expected_name {
                return Err(Error::chunk_set(format!(
                    "chunk {} is missing (found {} in its place)",
                    expected_name, actual
                )));
            }
        }
        Ok(())
    }

    /// Directory holding the chunks
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Common file name prefix
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Chunk paths in restore order
    pub fn paths(&self) -> &[PathBuf] {
        &self.chunks
    }

    /// Chunk file names in restore order
    pub fn file_names(&self) -> Vec<String> {
        self.chunks
            .iter()
            .filter_map(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .collect()
    }

    /// Number of chunks
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// True when no chunk was found
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Size of every chunk, in order
    pub fn sizes(&self) -> Result<Vec<u64>> {
        self.chunks
            .iter()
            .map(|p| Ok(fs::metadata(p)?.len()))
            .collect()
    }

    /// Combined size of all chunks
    pub fn total_size(&self) -> Result<u64> {
        Ok(self.sizes()?.iter().sum())
    }
}

/// Split a target pattern into its directory and file name prefix
pub fn split_pattern(pattern: &Path) -> Result<(PathBuf, String)> {
    let prefix = pattern
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| {
            Error::validation(format!(
                "{} has no usable file name prefix",
                pattern.display()
            ))
        })?
        .to_string();

    let dir = match pattern.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    Ok((dir, prefix))
}
