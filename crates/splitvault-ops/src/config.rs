//! Tool configuration: which programs make up each chain

use serde::{Deserialize, Serialize};
use splitvault_core::{Error, Result, StageSpec};
use splitvault_pipeline::DEFAULT_BUFFER_SIZE;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Default symmetric cipher for gpg
pub const DEFAULT_CIPHER_ALGORITHM: &str = "AES256";

fn default_gpg() -> PathBuf {
    PathBuf::from("gpg")
}

fn default_cat() -> PathBuf {
    PathBuf::from("cat")
}

fn default_algorithm() -> String {
    DEFAULT_CIPHER_ALGORITHM.to_string()
}

/// Encryption stage configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CipherConfig {
    /// Symmetric, passphrase-based gpg encryption
    Gpg {
        /// Path to gpg
        #[serde(default = "default_gpg")]
        program: PathBuf,
        /// Cipher algorithm passed to `--cipher-algo`
        #[serde(default = "default_algorithm")]
        algorithm: String,
        /// Read the passphrase from this file instead of prompting
        #[serde(default)]
        passphrase_file: Option<PathBuf>,
        /// Keyring and agent directory (`--homedir`), instead of `~/.gnupg`
        #[serde(default)]
        homedir: Option<PathBuf>,
    },

    /// No encryption: bytes pass through unchanged
    Passthrough {
        /// Program copying stdin to stdout
        #[serde(default = "default_cat")]
        program: PathBuf,
    },
}

impl CipherConfig {
    /// A passthrough cipher using `cat`
    pub fn passthrough() -> Self {
        CipherConfig::Passthrough {
            program: default_cat(),
        }
    }

    /// True unless this is a passthrough
    pub fn is_encrypted(&self) -> bool {
        matches!(self, CipherConfig::Gpg { .. })
    }

    /// Stage turning plaintext on stdin into ciphertext on stdout
    pub fn encrypt_stage(&self) -> StageSpec {
        match self {
            CipherConfig::Gpg {
                program,
                algorithm,
                passphrase_file,
                homedir,
            } => StageSpec::new(program)
                .args(gpg_args(homedir.as_deref(), passphrase_file.as_deref()))
                .args(["--cipher-algo", algorithm.as_str(), "--symmetric", "-"]),
            CipherConfig::Passthrough { program } => StageSpec::new(program),
        }
    }

    /// Stage turning ciphertext on stdin into plaintext on stdout
    pub fn decrypt_stage(&self) -> StageSpec {
        match self {
            CipherConfig::Gpg {
                program,
                passphrase_file,
                homedir,
                ..
            } => StageSpec::new(program)
                .args(gpg_args(homedir.as_deref(), passphrase_file.as_deref()))
                .arg("--decrypt"),
            CipherConfig::Passthrough { program } => StageSpec::new(program),
        }
    }
}

impl Default for CipherConfig {
    fn default() -> Self {
        CipherConfig::Gpg {
            program: default_gpg(),
            algorithm: default_algorithm(),
            passphrase_file: None,
            homedir: None,
        }
    }
}

fn gpg_args(homedir: Option<&Path>, passphrase_file: Option<&Path>) -> Vec<OsString> {
    let mut args: Vec<OsString> = Vec::new();
    if let Some(dir) = homedir {
        args.push("--homedir".into());
        args.push(dir.into());
    }
    if let Some(file) = passphrase_file {
        args.extend(
            ["--batch", "--yes", "--pinentry-mode", "loopback", "--passphrase-file"]
                .map(OsString::from),
        );
        args.push(file.into());
    }
    args
}

/// Programs and settings for backup and restore chains
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    /// Archiver (tar)
    pub archiver: PathBuf,
    /// Splitter (split)
    pub splitter: PathBuf,
    /// Concatenator (cat)
    pub concatenator: PathBuf,
    /// Encryption stage
    pub cipher: CipherConfig,
    /// Link transfer block size in bytes
    pub buffer_size: usize,
    /// Write a digest manifest beside the chunks after backup
    pub write_manifest: bool,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            archiver: PathBuf::from("tar"),
            splitter: PathBuf::from("split"),
            concatenator: PathBuf::from("cat"),
            cipher: CipherConfig::default(),
            buffer_size: DEFAULT_BUFFER_SIZE,
            write_manifest: true,
        }
    }
}

impl ToolConfig {
    /// Load configuration from a JSON file; missing fields take defaults
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::invalid_config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_str(&content).map_err(|e| {
            Error::invalid_config(format!("cannot parse {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        if self.buffer_size == 0 {
            return Err(Error::invalid_config("buffer_size must be positive"));
        }
        Ok(())
    }

    /// Use a passphrase file for gpg (no effect on a passthrough cipher)
    pub fn with_passphrase_file(mut self, file: impl Into<PathBuf>) -> Self {
        if let CipherConfig::Gpg {
            passphrase_file, ..
        } = &mut self.cipher
        {
            *passphrase_file = Some(file.into());
        }
        self
    }

    /// Use a separate gpg home directory (no effect on a passthrough cipher)
    pub fn with_gpg_homedir(mut self, dir: impl Into<PathBuf>) -> Self {
        if let CipherConfig::Gpg { homedir, .. } = &mut self.cipher {
            *homedir = Some(dir.into());
        }
        self
    }
}
