//! Fixtures shared by the operation tests

use crate::config::{CipherConfig, ToolConfig};

/// Tools with a `cat` passthrough instead of gpg
pub(crate) fn passthrough() -> ToolConfig {
    ToolConfig {
        cipher: CipherConfig::passthrough(),
        ..Default::default()
    }
}

/// Deterministic bytes gzip cannot shrink
pub(crate) fn noise(len: usize, seed: u64) -> Vec<u8> {
    let mut state = seed | 1;
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            (state >> 56) as u8
        })
        .collect()
}

/// True when a `gpg` binary can be run
pub(crate) fn gpg_available() -> bool {
    std::process::Command::new("gpg")
        .arg("--version")
        .output()
        .map(|out| out.status.success())
        .unwrap_or(false)
}
