use alloy::json_abi::JsonAbi;
use alloy::primitives::{Bytes, hex};
use alloy::sol;
use alloy::sol_types::SolCall;
use std::path::{Path, PathBuf};
use thiserror::Error;

sol! {
    interface IERC20 {
        function decimals() external view returns (uint8);
        function transfer(address to, uint256 amount) external returns (bool);
    }

    interface ISimpleStorage {
        function store(uint256 num) external;
    }
}

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid ABI in {path:?}: {source}")]
    Abi {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("invalid bytecode in {path:?}: {source}")]
    Bytecode {
        path: PathBuf,
        source: hex::FromHexError,
    },
    #[error("{path:?} has no `{signature}` entry point")]
    MissingEntryPoint { path: PathBuf, signature: String },
}

/// File locations of the contract artifacts. Files are read on every use.
#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    pub erc20_abi: PathBuf,
    pub storage_abi: PathBuf,
    pub storage_bytecode: PathBuf,
}

impl ArtifactPaths {
    /// Checks the ERC-20 interface file declares `decimals` and `transfer`.
    /// Calls are encoded with the `IERC20` bindings.
    pub fn check_erc20(&self) -> Result<(), ArtifactError> {
        let abi = load_abi(&self.erc20_abi)?;
        require_entry_point(&abi, &self.erc20_abi, IERC20::decimalsCall::SIGNATURE)?;
        require_entry_point(&abi, &self.erc20_abi, IERC20::transferCall::SIGNATURE)
    }

    /// Deployment bytecode of the storage contract, after checking its interface.
    pub fn load_storage_deployment(&self) -> Result<Bytes, ArtifactError> {
        self.check_storage_abi()?;
        load_bytecode(&self.storage_bytecode)
    }

    pub fn check_storage_abi(&self) -> Result<(), ArtifactError> {
        let abi = load_abi(&self.storage_abi)?;
        require_entry_point(&abi, &self.storage_abi, ISimpleStorage::storeCall::SIGNATURE)
    }
}

fn read(path: &Path) -> Result<String, ArtifactError> {
    std::fs::read_to_string(path).map_err(|source| ArtifactError::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn load_abi(path: &Path) -> Result<JsonAbi, ArtifactError> {
    let contents = read(path)?;
    serde_json::from_str(&contents).map_err(|source| ArtifactError::Abi {
        path: path.to_path_buf(),
        source,
    })
}

fn load_bytecode(path: &Path) -> Result<Bytes, ArtifactError> {
    let contents = read(path)?;
    let bytes = hex::decode(contents.trim()).map_err(|source| ArtifactError::Bytecode {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(bytes.into())
}

fn require_entry_point(abi: &JsonAbi, path: &Path, signature: &str) -> Result<(), ArtifactError> {
    let declared = abi
        .functions()
        .any(|function| function.signature() == signature);
    if declared {
        Ok(())
    } else {
        Err(ArtifactError::MissingEntryPoint {
            path: path.to_path_buf(),
            signature: signature.to_string(),
        })
    }
}

#[cfg(test)]
pub(crate) mod test_utils {
    use super::ArtifactPaths;
    use tempfile::TempDir;

    pub const ERC20_ABI: &str = r#"[
        {"type":"function","name":"decimals","inputs":[],"outputs":[{"name":"","type":"uint8","internalType":"uint8"}],"stateMutability":"view"},
        {"type":"function","name":"transfer","inputs":[{"name":"to","type":"address","internalType":"address"},{"name":"amount","type":"uint256","internalType":"uint256"}],"outputs":[{"name":"","type":"bool","internalType":"bool"}],"stateMutability":"nonpayable"}
    ]"#;

    pub const STORAGE_ABI: &str = r#"[
        {"type":"constructor","inputs":[],"stateMutability":"nonpayable"},
        {"type":"function","name":"store","inputs":[{"name":"num","type":"uint256","internalType":"uint256"}],"outputs":[],"stateMutability":"nonpayable"}
    ]"#;

    pub const STORAGE_BYTECODE: &str = "0x603180600b6000396000f3fe";

    /// Writes a full artifact set into a fresh temp dir.
    pub fn write_artifacts() -> (TempDir, ArtifactPaths) {
        let dir = tempfile::tempdir().unwrap();
        let paths = ArtifactPaths {
            erc20_abi: dir.path().join("erc20_abi.json"),
            storage_abi: dir.path().join("simple_storage_abi.json"),
            storage_bytecode: dir.path().join("simple_storage_bytecode.txt"),
        };
        std::fs::write(&paths.erc20_abi, ERC20_ABI).unwrap();
        std::fs::write(&paths.storage_abi, STORAGE_ABI).unwrap();
        std::fs::write(&paths.storage_bytecode, format!("{}\n", STORAGE_BYTECODE)).unwrap();
        (dir, paths)
    }
}
