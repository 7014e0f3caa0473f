//! Deployer wallet: a BIP-39 mnemonic and the account derived from it
//!
//! Key derivation and signing are done by the `bip39` and `cosmrs` crates; this module
//! only wires them to a chain's prefix and coin type.

use crate::error::{DeployError, Result};
use crate::network::ChainInfo;
use bip39::Mnemonic;
use cosmrs::bip32::DerivationPath;
use cosmrs::crypto::secp256k1::SigningKey;
use cosmrs::crypto::PublicKey;
use rand::rngs::OsRng;
use rand::RngCore;
use std::fmt;

pub struct Wallet {
    mnemonic: Mnemonic,
    signing_key: SigningKey,
    address: String,
    path: String,
}

impl Wallet {
    /// Derives the account at `m/44'/{coin_type}'/{account}'/0/{index}`.
    pub fn from_mnemonic(phrase: &str, chain: &ChainInfo, account: u32, index: u32) -> Result<Self> {
        let normalized = phrase.split_whitespace().collect::<Vec<_>>().join(" ");
        let mnemonic = Mnemonic::parse(&normalized)
            .map_err(|e| DeployError::Wallet(format!("Invalid mnemonic: {}", e)))?;

        let path = derivation_path(chain.coin_type, account, index);
        let parsed: DerivationPath = path
            .parse()
            .map_err(|e| DeployError::Wallet(format!("Invalid derivation path {}: {}", path, e)))?;

        let seed = mnemonic.to_seed("");
        let signing_key = SigningKey::derive_from_path(seed, &parsed)
            .map_err(|e| DeployError::Wallet(format!("Key derivation failed: {}", e)))?;

        let address = signing_key
            .public_key()
            .account_id(&chain.prefix)
            .map_err(|e| DeployError::Wallet(format!("Address derivation failed: {}", e)))?
            .to_string();

        Ok(Wallet {
            mnemonic,
            signing_key,
            address,
            path,
        })
    }

    /// Reads the mnemonic from the environment variable that belongs to the chain kind.
    pub fn from_env(chain: &ChainInfo, account: u32, index: u32) -> Result<Self> {
        let var = chain.kind.mnemonic_env();
        let phrase = std::env::var(var).map_err(|_| {
            DeployError::Wallet(format!(
                "Environment variable {} is not set (needed for {} network {})",
                var, chain.kind, chain.chain_id
            ))
        })?;
        Self::from_mnemonic(&phrase, chain, account, index)
    }

    /// Generates a new random mnemonic with the given word count (12, 15, 18, 21 or 24).
    pub fn generate(word_count: usize) -> Result<Mnemonic> {
        if !(12..=24).contains(&word_count) || word_count % 3 != 0 {
            return Err(DeployError::Wallet(format!(
                "Word count must be one of 12, 15, 18, 21, 24; got {}",
                word_count
            )));
        }
        let mut entropy = vec![0u8; word_count / 3 * 4];
        OsRng.fill_bytes(&mut entropy);
        Mnemonic::from_entropy(&entropy)
            .map_err(|e| DeployError::Wallet(format!("Mnemonic generation failed: {}", e)))
    }

    /// Bech32 account address.
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn derivation_path(&self) -> &str {
        &self.path
    }

    pub fn public_key(&self) -> PublicKey {
        self.signing_key.public_key()
    }

    pub(crate) fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }

    pub fn word_count(&self) -> usize {
        self.mnemonic.word_count()
    }
}

impl fmt::Debug for Wallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wallet")
            .field("address", &self.address)
            .field("path", &self.path)
            .field("mnemonic", &"<redacted>")
            .finish()
    }
}

pub fn derivation_path(coin_type: u32, account: u32, index: u32) -> String {
    format!("m/44'/{}'/{}'/0/{}", coin_type, account, index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::lookup;

    // LocalTerra `test1` account
    const TEST1_MNEMONIC: &str = "notice oak worry limit wrap speak medal online prefer cluster roof addict wrist behave treat actual wasp year salad speed social layer crew genius";
    const TEST1_ADDRESS: &str = "terra1x46rqay4d3cssq8gxxvqz8xt6nwlz4td20k38v";

    #[test]
    fn test_known_account_derivation() {
        let chain = lookup("localterra").unwrap();
        let wallet = Wallet::from_mnemonic(TEST1_MNEMONIC, &chain, 0, 0).unwrap();
        assert_eq!(wallet.address(), TEST1_ADDRESS);
        assert_eq!(wallet.derivation_path(), "m/44'/330'/0'/0/0");
        assert_eq!(wallet.word_count(), 24);
    }

    #[test]
    fn test_whitespace_is_normalized() {
        let chain = lookup("localterra").unwrap();
        let messy = format!("  {}\n", TEST1_MNEMONIC.replace(' ', "   "));
        let wallet = Wallet::from_mnemonic(&messy, &chain, 0, 0).unwrap();
        assert_eq!(wallet.address(), TEST1_ADDRESS);
    }

    #[test]
    fn test_index_changes_address() {
        let chain = lookup("localterra").unwrap();
        let first = Wallet::from_mnemonic(TEST1_MNEMONIC, &chain, 0, 0).unwrap();
        let second = Wallet::from_mnemonic(TEST1_MNEMONIC, &chain, 0, 1).unwrap();
        assert_ne!(first.address(), second.address());
        assert!(second.address().starts_with("terra1"));
    }

    #[test]
    fn test_prefix_follows_chain() {
        let chain = lookup("uni-6").unwrap();
        let wallet = Wallet::from_mnemonic(TEST1_MNEMONIC, &chain, 0, 0).unwrap();
        assert!(wallet.address().starts_with("juno1"));
        assert_eq!(wallet.derivation_path(), "m/44'/118'/0'/0/0");
    }

    #[test]
    fn test_invalid_mnemonic() {
        let chain = lookup("localterra").unwrap();
        let result = Wallet::from_mnemonic("notice oak worry", &chain, 0, 0);
        assert!(result.unwrap_err().to_string().contains("Invalid mnemonic"));
    }

    #[test]
    fn test_generate_round_trips_through_parse() {
        let chain = lookup("localterra").unwrap();
        let mnemonic = Wallet::generate(12).unwrap();
        assert_eq!(mnemonic.word_count(), 12);
        let wallet = Wallet::from_mnemonic(&mnemonic.to_string(), &chain, 0, 0).unwrap();
        assert!(wallet.address().starts_with("terra1"));
        assert!(Wallet::generate(13).is_err());
    }

    #[test]
    fn test_debug_redacts_mnemonic() {
        let chain = lookup("localterra").unwrap();
        let wallet = Wallet::from_mnemonic(TEST1_MNEMONIC, &chain, 0, 0).unwrap();
        let debug = format!("{:?}", wallet);
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains("notice"));
    }
}
