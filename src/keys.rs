use alloy::signers::local::PrivateKeySigner;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("failed to read key list {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid private key: {0}")]
    Invalid(#[from] alloy::signers::local::LocalSignerError),
}

/// Where private keys come from. Loaded again at the start of every pass.
pub trait KeySource: Send + Sync {
    fn load(&self) -> Result<Vec<String>, KeyError>;

    fn describe(&self) -> String;
}

/// Plain newline-delimited key file.
#[derive(Debug, Clone)]
pub struct KeyFile {
    path: PathBuf,
}

impl KeyFile {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl KeySource for KeyFile {
    fn load(&self) -> Result<Vec<String>, KeyError> {
        let contents = std::fs::read_to_string(&self.path).map_err(|source| KeyError::Read {
            path: self.path.clone(),
            source,
        })?;
        Ok(parse_key_list(&contents))
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// One key per line, surrounding whitespace and blank lines dropped.
pub fn parse_key_list(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_owned)
        .collect()
}

pub fn derive_signer(key: &str) -> Result<PrivateKeySigner, KeyError> {
    Ok(key.parse::<PrivateKeySigner>()?)
}
