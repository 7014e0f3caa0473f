//! Deployment state: code ids, contract addresses and wasm checksums per chain
//!
//! The state lives in a single JSON file keyed by chain id. Writes are atomic
//! (temporary file + rename) and keep a `.backup` of the previous version.

use crate::error::{DeployError, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const MAX_NAME_LENGTH: usize = 64;
const MAX_ADDRESS_LENGTH: usize = 128;
const BACKUP_SUFFIX: &str = ".backup";

/// Everything recorded for one chain.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChainDeployment {
    #[serde(default)]
    pub code_ids: BTreeMap<String, u64>,
    #[serde(default)]
    pub addresses: BTreeMap<String, String>,
    /// Hex sha256 of the wasm that produced each code id
    #[serde(default)]
    pub checksums: BTreeMap<String, String>,
    /// RFC3339 timestamp of the last change on this chain
    #[serde(default)]
    pub updated_at: String,
}

/// One row of [`DeploymentState::list`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateEntry {
    pub name: String,
    pub code_id: Option<u64>,
    pub address: Option<String>,
    pub checksum: Option<String>,
}

/// Thread-safe handle on the deployment state.
#[derive(Debug, Clone)]
pub struct DeploymentState {
    inner: Arc<RwLock<StateInner>>,
    path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StateInner {
    chains: BTreeMap<String, ChainDeployment>,
    metadata: StateMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StateMetadata {
    version: String,
    created_at: String,
    last_modified: String,
}

impl Default for StateInner {
    fn default() -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        StateInner {
            chains: BTreeMap::new(),
            metadata: StateMetadata {
                version: "1.0.0".to_string(),
                created_at: now.clone(),
                last_modified: now,
            },
        }
    }
}

impl StateInner {
    fn chain_mut(&mut self, chain_id: &str) -> &mut ChainDeployment {
        let now = chrono::Utc::now().to_rfc3339();
        self.metadata.last_modified = now.clone();
        let chain = self.chains.entry(chain_id.to_string()).or_default();
        chain.updated_at = now;
        chain
    }
}

impl DeploymentState {
    /// Empty in-memory state, not bound to any file.
    pub fn new() -> Self {
        DeploymentState {
            inner: Arc::new(RwLock::new(StateInner::default())),
            path: None,
        }
    }

    /// Copy of this state that is never written back to disk.
    pub fn detached(&self) -> Self {
        DeploymentState {
            inner: Arc::new(RwLock::new(self.inner.read().clone())),
            path: None,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn set_code_id(&self, chain_id: &str, name: &str, code_id: u64, checksum: &str) -> Result<()> {
        validate_name(name)?;
        let mut inner = self.inner.write();
        let chain = inner.chain_mut(chain_id);
        chain.code_ids.insert(name.to_string(), code_id);
        chain.checksums.insert(name.to_string(), checksum.to_string());
        Ok(())
    }

    pub fn set_address(&self, chain_id: &str, name: &str, address: &str) -> Result<()> {
        validate_name(name)?;
        validate_address(address)?;
        let mut inner = self.inner.write();
        inner
            .chain_mut(chain_id)
            .addresses
            .insert(name.to_string(), address.to_string());
        Ok(())
    }

    pub fn code_id(&self, chain_id: &str, name: &str) -> Option<u64> {
        let inner = self.inner.read();
        inner.chains.get(chain_id)?.code_ids.get(name).copied()
    }

    pub fn address(&self, chain_id: &str, name: &str) -> Option<String> {
        let inner = self.inner.read();
        inner.chains.get(chain_id)?.addresses.get(name).cloned()
    }

    pub fn checksum(&self, chain_id: &str, name: &str) -> Option<String> {
        let inner = self.inner.read();
        inner.chains.get(chain_id)?.checksums.get(name).cloned()
    }

    /// Snapshot of one chain's records (empty when nothing was deployed there).
    pub fn chain(&self, chain_id: &str) -> ChainDeployment {
        let inner = self.inner.read();
        inner.chains.get(chain_id).cloned().unwrap_or_default()
    }

    /// Chain ids with at least one record.
    pub fn chains(&self) -> Vec<String> {
        let inner = self.inner.read();
        inner.chains.keys().cloned().collect()
    }

    /// Reverse lookup: the contract name recorded for an address.
    pub fn name_of(&self, chain_id: &str, address: &str) -> Option<String> {
        let inner = self.inner.read();
        inner
            .chains
            .get(chain_id)?
            .addresses
            .iter()
            .find(|(_, a)| a.as_str() == address)
            .map(|(n, _)| n.clone())
    }

    /// All contracts recorded on a chain, sorted by name.
    pub fn list(&self, chain_id: &str) -> Vec<StateEntry> {
        let chain = self.chain(chain_id);
        let mut names: Vec<&String> = chain
            .code_ids
            .keys()
            .chain(chain.addresses.keys())
            .collect();
        names.sort();
        names.dedup();
        names
            .into_iter()
            .map(|name| StateEntry {
                name: name.clone(),
                code_id: chain.code_ids.get(name).copied(),
                address: chain.addresses.get(name).cloned(),
                checksum: chain.checksums.get(name).cloned(),
            })
            .collect()
    }

    /// Forgets everything recorded for `name` on a chain.
    pub fn remove(&self, chain_id: &str, name: &str) -> Result<StateEntry> {
        let mut inner = self.inner.write();
        let chain = inner
            .chains
            .get_mut(chain_id)
            .ok_or_else(|| DeployError::State(format!("Nothing recorded for chain {}", chain_id)))?;

        let entry = StateEntry {
            name: name.to_string(),
            code_id: chain.code_ids.remove(name),
            address: chain.addresses.remove(name),
            checksum: chain.checksums.remove(name),
        };
        if entry.code_id.is_none() && entry.address.is_none() {
            return Err(DeployError::State(format!(
                "Contract '{}' not found on {}",
                name, chain_id
            )));
        }
        chain.updated_at = chrono::Utc::now().to_rfc3339();
        if chain.code_ids.is_empty() && chain.addresses.is_empty() {
            inner.chains.remove(chain_id);
        }
        inner.metadata.last_modified = chrono::Utc::now().to_rfc3339();
        Ok(entry)
    }

    /// Writes the state back to the file it was loaded from. Detached states are left alone.
    pub fn persist(&self) -> Result<()> {
        match &self.path {
            Some(path) => self.save(path),
            None => Ok(()),
        }
    }

    /// Save state to file with atomic write and backup
    pub fn save(&self, path: &Path) -> Result<()> {
        let inner = self.inner.read();

        if path.exists() {
            let backup_path = PathBuf::from(format!("{}{}", path.display(), BACKUP_SUFFIX));
            fs::copy(path, &backup_path)
                .map_err(|e| DeployError::State(format!("Failed to create backup: {}", e)))?;
        }

        let json = serde_json::to_string_pretty(&*inner)
            .map_err(|e| DeployError::State(format!("Failed to serialize state: {}", e)))?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| DeployError::State(format!("Failed to create state dir: {}", e)))?;
        }

        let temp_path = path.with_extension("tmp");
        let mut file = File::create(&temp_path)
            .map_err(|e| DeployError::State(format!("Failed to create temp file: {}", e)))?;
        file.write_all(json.as_bytes())
            .map_err(|e| DeployError::State(format!("Failed to write state: {}", e)))?;
        file.sync_all()
            .map_err(|e| DeployError::State(format!("Failed to sync file: {}", e)))?;
        drop(file);

        fs::rename(&temp_path, path)
            .map_err(|e| DeployError::State(format!("Failed to finalize write: {}", e)))?;

        tracing::debug!("Deployment state saved to {}", path.display());
        Ok(())
    }

    /// Load state from file, bound to that file for later [`persist`](Self::persist) calls.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| DeployError::State(format!("Failed to read {}: {}", path.display(), e)))?;

        let inner: StateInner = serde_json::from_str(&contents)
            .map_err(|e| DeployError::State(format!("Failed to parse {}: {}", path.display(), e)))?;

        for chain in inner.chains.values() {
            for name in chain.code_ids.keys().chain(chain.addresses.keys()) {
                validate_name(name)?;
            }
            for address in chain.addresses.values() {
                validate_address(address)?;
            }
        }

        Ok(DeploymentState {
            inner: Arc::new(RwLock::new(inner)),
            path: Some(path.to_path_buf()),
        })
    }

    /// Load from path, or start an empty state bound to that path.
    pub fn load_or_new(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(DeploymentState {
                inner: Arc::new(RwLock::new(StateInner::default())),
                path: Some(path.to_path_buf()),
            })
        }
    }

    /// Export one chain's records in CSV format
    pub fn export_csv(&self, chain_id: &str, path: &Path) -> Result<()> {
        let mut csv = String::from("Name,CodeId,Address,Checksum\n");
        for entry in self.list(chain_id) {
            csv.push_str(&format!(
                "\"{}\",{},\"{}\",\"{}\"\n",
                entry.name,
                entry.code_id.map(|c| c.to_string()).unwrap_or_default(),
                entry.address.unwrap_or_default(),
                entry.checksum.unwrap_or_default()
            ));
        }

        fs::write(path, csv)
            .map_err(|e| DeployError::State(format!("Failed to export CSV: {}", e)))?;
        Ok(())
    }
}

impl Default for DeploymentState {
    fn default() -> Self {
        Self::new()
    }
}

/// Contract names: non-empty, ASCII alphanumerics plus `-_.:`.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(DeployError::State("Contract name cannot be empty".to_string()));
    }

    if name.len() > MAX_NAME_LENGTH {
        return Err(DeployError::State(format!(
            "Contract name too long (max {} characters)",
            MAX_NAME_LENGTH
        )));
    }

    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "-_.:".contains(c))
    {
        return Err(DeployError::State(format!(
            "Contract name '{}' contains invalid characters",
            name
        )));
    }

    Ok(())
}

fn validate_address(address: &str) -> Result<()> {
    if address.is_empty() {
        return Err(DeployError::State("Address cannot be empty".to_string()));
    }

    if address.len() > MAX_ADDRESS_LENGTH {
        return Err(DeployError::State(format!(
            "Address too long (max {} characters)",
            MAX_ADDRESS_LENGTH
        )));
    }

    if !address.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(DeployError::State(format!(
            "Invalid address format '{}'",
            address
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const CHAIN: &str = "localterra";
    const PAIR: &str = "terra14hj2tavq8fpesdwxxcu44rty3hh90vhujrvcmstl4zr3txmfvw9ssrc8au";

    #[test]
    fn test_record_and_lookup() {
        let state = DeploymentState::new();
        state.set_code_id(CHAIN, "terraswap_pair", 4, "abcd").unwrap();
        state.set_address(CHAIN, "terraswap_pair", PAIR).unwrap();

        assert_eq!(state.code_id(CHAIN, "terraswap_pair"), Some(4));
        assert_eq!(state.address(CHAIN, "terraswap_pair").as_deref(), Some(PAIR));
        assert_eq!(state.checksum(CHAIN, "terraswap_pair").as_deref(), Some("abcd"));
        assert_eq!(state.name_of(CHAIN, PAIR).as_deref(), Some("terraswap_pair"));
        assert!(state.code_id("pisco-1", "terraswap_pair").is_none());
    }

    #[test]
    fn test_chains_are_isolated() {
        let state = DeploymentState::new();
        state.set_code_id(CHAIN, "token", 1, "aa").unwrap();
        state.set_code_id("pisco-1", "token", 900, "aa").unwrap();
        assert_eq!(state.code_id(CHAIN, "token"), Some(1));
        assert_eq!(state.code_id("pisco-1", "token"), Some(900));
        assert_eq!(state.chains(), vec!["localterra".to_string(), "pisco-1".to_string()]);
    }

    #[test]
    fn test_list_merges_code_ids_and_addresses() {
        let state = DeploymentState::new();
        state.set_code_id(CHAIN, "token", 1, "aa").unwrap();
        state.set_code_id(CHAIN, "pair", 2, "bb").unwrap();
        state.set_address(CHAIN, "pair", PAIR).unwrap();
        state.set_address(CHAIN, "external", "terra1abc").unwrap();

        let entries = state.list(CHAIN);
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["external", "pair", "token"]);
        assert_eq!(entries[0].code_id, None);
        assert_eq!(entries[1].address.as_deref(), Some(PAIR));
        assert_eq!(entries[2].address, None);
    }

    #[test]
    fn test_remove() {
        let state = DeploymentState::new();
        state.set_code_id(CHAIN, "token", 1, "aa").unwrap();
        let removed = state.remove(CHAIN, "token").unwrap();
        assert_eq!(removed.code_id, Some(1));
        assert!(state.code_id(CHAIN, "token").is_none());
        assert!(state.chains().is_empty());
        assert!(state.remove(CHAIN, "token").is_err());
    }

    #[test]
    fn test_name_validation() {
        let state = DeploymentState::new();
        assert!(state.set_code_id(CHAIN, "", 1, "aa").is_err());
        assert!(state.set_code_id(CHAIN, "has space", 1, "aa").is_err());
        assert!(state.set_code_id(CHAIN, &"x".repeat(65), 1, "aa").is_err());
        assert!(state.set_code_id(CHAIN, "abstract:ans-host", 1, "aa").is_ok());
        assert!(state.set_address(CHAIN, "token", "terra1-bad").is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");

        let state = DeploymentState::load_or_new(&path).unwrap();
        state.set_code_id(CHAIN, "token", 7, "ff00").unwrap();
        state.set_address(CHAIN, "token", "terra1token").unwrap();
        state.persist().unwrap();
        assert!(path.exists());

        let loaded = DeploymentState::load(&path).unwrap();
        assert_eq!(loaded.code_id(CHAIN, "token"), Some(7));
        assert_eq!(loaded.address(CHAIN, "token").as_deref(), Some("terra1token"));
        assert_eq!(loaded.chain(CHAIN), state.chain(CHAIN));

        // second save keeps a backup of the first
        loaded.set_code_id(CHAIN, "pair", 8, "ee").unwrap();
        loaded.persist().unwrap();
        assert!(dir.path().join("state.json.backup").exists());
    }

    #[test]
    fn test_detached_is_not_persisted() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        let state = DeploymentState::load_or_new(&path).unwrap();
        state.set_code_id(CHAIN, "token", 7, "ff").unwrap();

        let dry = state.detached();
        dry.set_code_id(CHAIN, "pair", 8, "ee").unwrap();
        dry.persist().unwrap();
        assert!(!path.exists());
        assert_eq!(dry.code_id(CHAIN, "token"), Some(7));
        assert!(state.code_id(CHAIN, "pair").is_none());
    }

    #[test]
    fn test_load_rejects_corrupt_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = DeploymentState::load(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse"));
    }

    #[test]
    fn test_export_csv() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.csv");
        let state = DeploymentState::new();
        state.set_code_id(CHAIN, "token", 1, "aa").unwrap();
        state.set_address(CHAIN, "token", "terra1token").unwrap();
        state.export_csv(CHAIN, &path).unwrap();

        let csv = std::fs::read_to_string(&path).unwrap();
        assert!(csv.starts_with("Name,CodeId,Address,Checksum\n"));
        assert!(csv.contains("\"token\",1,\"terra1token\",\"aa\""));
    }

    #[test]
    fn test_thread_safety() {
        let state = DeploymentState::new();
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let state = state.clone();
                std::thread::spawn(move || {
                    state
                        .set_code_id(CHAIN, &format!("contract_{}", i), i, "aa")
                        .unwrap();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(state.list(CHAIN).len(), 8);
    }
}
