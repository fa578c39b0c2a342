use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Environment variable selecting the data directory
pub const NODE_STORE_ENV: &str = "NODE_STORE";

/// Data directory used when `NODE_STORE` is unset
pub const DEFAULT_STORE_DIR: &str = "./.simple_blockchain";

/// Filesystem layout of a node's data directory
///
/// The store directory holds `db/blockchain.db` (the chain file) and
/// `wallet.dat` (the key store).
#[derive(Debug, Clone)]
pub struct NodeConfig {
    store_dir: PathBuf,
}

impl NodeConfig {
    /// Resolves the data directory from `NODE_STORE`, falling back to
    /// the default
    pub fn from_env() -> Self {
        let store_dir = env::var(NODE_STORE_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_STORE_DIR));

        NodeConfig { store_dir }
    }

    /// Uses an explicit data directory
    pub fn with_store_dir<P: AsRef<Path>>(store_dir: P) -> Self {
        NodeConfig {
            store_dir: store_dir.as_ref().to_path_buf(),
        }
    }

    pub fn store_dir(&self) -> &Path {
        &self.store_dir
    }

    /// Path of the chain file
    pub fn db_path(&self) -> PathBuf {
        self.store_dir.join("db").join("blockchain.db")
    }

    /// Path of the wallet file
    pub fn wallet_path(&self) -> PathBuf {
        self.store_dir.join("wallet.dat")
    }

    /// Creates the store and db directories if missing
    pub fn ensure_dirs(&self) -> io::Result<()> {
        fs::create_dir_all(self.store_dir.join("db"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        let config = NodeConfig::with_store_dir("/tmp/node-store");

        assert_eq!(
            config.db_path(),
            PathBuf::from("/tmp/node-store/db/blockchain.db")
        );
        assert_eq!(config.wallet_path(), PathBuf::from("/tmp/node-store/wallet.dat"));
    }

    #[test]
    fn test_from_env_override() {
        env::set_var(NODE_STORE_ENV, "/tmp/elsewhere");
        let config = NodeConfig::from_env();
        env::remove_var(NODE_STORE_ENV);

        assert_eq!(config.store_dir(), Path::new("/tmp/elsewhere"));

        let fallback = NodeConfig::from_env();
        assert_eq!(fallback.store_dir(), Path::new(DEFAULT_STORE_DIR));
    }

    #[test]
    fn test_ensure_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let config = NodeConfig::with_store_dir(dir.path().join("store"));

        config.ensure_dirs().unwrap();
        assert!(config.db_path().parent().unwrap().is_dir());

        // Idempotent on an existing layout.
        config.ensure_dirs().unwrap();
    }
}
