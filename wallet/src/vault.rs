//! Encrypted key vault
//!
//! One JSON file per account, named after the lower-case hex address.
//! Each file is self-describing: it names its cipher and KDF and carries
//! every parameter needed to decrypt it, so entries written with older
//! cost settings keep working after the defaults change.
//!
//! - Argon2id derives a 256-bit key from the passphrase and a fresh salt
//! - AES-256-GCM encrypts the private key; the address is bound as
//!   associated data so an entry cannot be moved to another file name
//! - Writes go to a temporary file that is hard-linked into place, so an
//!   existing entry is never replaced

use crate::keypair::{KeypairError, PrivateKey};
use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce, Tag};
use alloy_primitives::Address;
use argon2::{Algorithm, Argon2, Params, Version};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use zeroize::Zeroizing;

/// On-disk format version.
pub const VAULT_VERSION: u32 = 1;
pub const CIPHER_AES_256_GCM: &str = "aes-256-gcm";
pub const KDF_ARGON2ID: &str = "argon2id";

const SALT_LEN: usize = 32;
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;
const KEY_LEN: usize = 32;

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("Vault write failed: {0}")]
    Write(#[source] io::Error),

    #[error("Vault read failed: {0}")]
    Read(#[source] io::Error),

    #[error("Address {0} not found in vault")]
    AddressNotFound(String),

    #[error("Authorization failed: wrong passphrase")]
    WrongPassphrase,

    #[error("Account {0} already exists in vault")]
    AlreadyExists(String),

    #[error("Unsupported vault entry: {0}")]
    Unsupported(String),

    #[error("Corrupt vault entry {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("Key error: {0}")]
    Key(#[from] KeypairError),
}

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// Memory cost in KiB
    pub m_cost: u32,
    /// Time cost (iterations)
    pub t_cost: u32,
    /// Parallelism
    pub p_cost: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            m_cost: 65536, // 64 MiB
            t_cost: 3,
            p_cost: 4,
        }
    }
}

impl KdfParams {
    /// Cheap settings for constrained machines and tests (4 MiB, 1 lane).
    pub fn light() -> Self {
        Self {
            m_cost: 4096,
            t_cost: 3,
            p_cost: 1,
        }
    }

    fn argon2(&self) -> Result<Argon2<'static>, String> {
        let params = Params::new(self.m_cost, self.t_cost, self.p_cost, Some(KEY_LEN))
            .map_err(|e| e.to_string())?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }
}

/// A stored account: its address and the file holding it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub address: Address,
    pub path: PathBuf,
}

/// Persisted record for one account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultEntry {
    pub version: u32,
    /// Checksummed address
    pub address: String,
    pub crypto: CryptoParams,
    /// Unix timestamp of creation
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CryptoParams {
    pub cipher: String,
    #[serde(with = "hex")]
    pub nonce: Vec<u8>,
    #[serde(with = "hex")]
    pub ciphertext: Vec<u8>,
    #[serde(with = "hex")]
    pub tag: Vec<u8>,
    pub kdf: String,
    pub kdfparams: KdfParams,
    #[serde(with = "hex")]
    pub salt: Vec<u8>,
}

/// Directory of encrypted key files.
#[derive(Debug, Clone)]
pub struct KeyVault {
    dir: PathBuf,
    kdf_params: KdfParams,
}

impl KeyVault {
    /// Open (creating if needed) a vault rooted at `dir`.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self, VaultError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(VaultError::Write)?;
        Ok(Self {
            dir,
            kdf_params: KdfParams::default(),
        })
    }

    /// Cost parameters used for entries written from now on.
    pub fn with_kdf_params(mut self, kdf_params: KdfParams) -> Self {
        self.kdf_params = kdf_params;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn entry_path(&self, address: &Address) -> PathBuf {
        self.dir.join(format!("{}.json", hex::encode(address.as_slice())))
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.entry_path(address).is_file()
    }

    /// Encrypt `private_key` under `passphrase` and persist it.
    ///
    /// An existing entry for the same address is never replaced; the call
    /// fails with [`VaultError::AlreadyExists`] and leaves it untouched.
    pub fn store(&self, passphrase: &str, private_key: &PrivateKey) -> Result<Account, VaultError> {
        let address = private_key.address()?;
        let path = self.entry_path(&address);
        if path.exists() {
            return Err(VaultError::AlreadyExists(address.to_checksum(None)));
        }

        let mut salt = [0u8; SALT_LEN];
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut salt);
        OsRng.fill_bytes(&mut nonce);

        let params = self.kdf_params;
        let key = derive_key(passphrase, &salt, &params).map_err(VaultError::Unsupported)?;
        let cipher = Aes256Gcm::new_from_slice(key.as_slice())
            .map_err(|e| VaultError::Unsupported(e.to_string()))?;

        let mut buffer = private_key.as_bytes().to_vec();
        let tag = cipher
            .encrypt_in_place_detached(Nonce::from_slice(&nonce), address.as_slice(), &mut buffer)
            .map_err(|e| VaultError::Unsupported(e.to_string()))?;

        let entry = VaultEntry {
            version: VAULT_VERSION,
            address: address.to_checksum(None),
            crypto: CryptoParams {
                cipher: CIPHER_AES_256_GCM.to_string(),
                nonce: nonce.to_vec(),
                ciphertext: buffer,
                tag: tag.to_vec(),
                kdf: KDF_ARGON2ID.to_string(),
                kdfparams: params,
                salt: salt.to_vec(),
            },
            created_at: chrono::Utc::now().timestamp(),
        };

        let json = serde_json::to_vec_pretty(&entry)
            .map_err(|e| VaultError::Write(io::Error::new(io::ErrorKind::InvalidData, e)))?;
        match write_new(&self.dir, &path, &json) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(VaultError::AlreadyExists(address.to_checksum(None)));
            }
            Err(e) => return Err(VaultError::Write(e)),
        }

        log::info!("Stored vault entry for {}", entry.address);
        Ok(Account { address, path })
    }

    /// Decrypt the key stored for `address`.
    ///
    /// Any passphrase that does not reproduce the original key fails with
    /// [`VaultError::WrongPassphrase`]; the error carries no detail about
    /// how decryption failed.
    pub fn unlock(&self, passphrase: &str, address: &Address) -> Result<PrivateKey, VaultError> {
        let path = self.entry_path(address);
        let entry = self.load_entry(&path, address)?;
        let crypto = &entry.crypto;

        if entry.version != VAULT_VERSION {
            return Err(VaultError::Unsupported(format!("version {}", entry.version)));
        }
        if crypto.cipher != CIPHER_AES_256_GCM {
            return Err(VaultError::Unsupported(format!("cipher {}", crypto.cipher)));
        }
        if crypto.kdf != KDF_ARGON2ID {
            return Err(VaultError::Unsupported(format!("kdf {}", crypto.kdf)));
        }
        if crypto.nonce.len() != NONCE_LEN || crypto.tag.len() != TAG_LEN {
            return Err(VaultError::Corrupt {
                path,
                reason: "bad nonce or tag length".to_string(),
            });
        }

        let key = derive_key(passphrase, &crypto.salt, &crypto.kdfparams)
            .map_err(|reason| VaultError::Corrupt {
                path: path.clone(),
                reason,
            })?;
        let cipher = Aes256Gcm::new_from_slice(key.as_slice())
            .map_err(|e| VaultError::Unsupported(e.to_string()))?;

        let mut buffer = Zeroizing::new(crypto.ciphertext.clone());
        cipher
            .decrypt_in_place_detached(
                Nonce::from_slice(&crypto.nonce),
                address.as_slice(),
                &mut buffer[..],
                Tag::from_slice(&crypto.tag),
            )
            .map_err(|_| VaultError::WrongPassphrase)?;

        let private_key = PrivateKey::from_bytes(&buffer).map_err(|_| VaultError::WrongPassphrase)?;
        if private_key.address()? != *address {
            return Err(VaultError::WrongPassphrase);
        }

        log::debug!("Unlocked vault entry for {}", address.to_checksum(None));
        Ok(private_key)
    }

    /// All stored addresses. Unreadable files are skipped with a warning.
    pub fn list(&self) -> Result<BTreeSet<Address>, VaultError> {
        let mut addresses = BTreeSet::new();

        for entry in fs::read_dir(&self.dir).map_err(VaultError::Read)? {
            let path = entry.map_err(VaultError::Read)?.path();
            if !path.is_file() || path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }

            match read_entry(&path) {
                Ok(stored) => match stored.address.parse::<Address>() {
                    Ok(address) => {
                        addresses.insert(address);
                    }
                    Err(e) => log::warn!("Skipping {}: bad address: {}", path.display(), e),
                },
                Err(e) => log::warn!("Skipping {}: {}", path.display(), e),
            }
        }

        Ok(addresses)
    }

    /// Remove the entry for `address` after proving the passphrase.
    ///
    /// Deleting an address that is not stored succeeds without doing anything.
    pub fn delete(&self, passphrase: &str, address: &Address) -> Result<(), VaultError> {
        let path = self.entry_path(address);
        if !path.exists() {
            log::debug!("Delete of absent entry {} is a no-op", address.to_checksum(None));
            return Ok(());
        }

        // Authorization only; the key is dropped (and wiped) immediately
        self.unlock(passphrase, address)?;

        match fs::remove_file(&path) {
            Ok(()) => {
                log::info!("Deleted vault entry for {}", address.to_checksum(None));
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(VaultError::Write(e)),
        }
    }

    fn load_entry(&self, path: &Path, address: &Address) -> Result<VaultEntry, VaultError> {
        if !path.is_file() {
            return Err(VaultError::AddressNotFound(address.to_checksum(None)));
        }
        let entry = read_entry(path)?;

        let stored: Address = entry.address.parse().map_err(|_| VaultError::Corrupt {
            path: path.to_path_buf(),
            reason: "unparseable address".to_string(),
        })?;
        if stored != *address {
            return Err(VaultError::Corrupt {
                path: path.to_path_buf(),
                reason: format!("entry holds {}", entry.address),
            });
        }
        Ok(entry)
    }
}

fn read_entry(path: &Path) -> Result<VaultEntry, VaultError> {
    let data = fs::read(path).map_err(VaultError::Read)?;
    serde_json::from_slice(&data).map_err(|e| VaultError::Corrupt {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

fn derive_key(
    passphrase: &str,
    salt: &[u8],
    params: &KdfParams,
) -> Result<Zeroizing<[u8; KEY_LEN]>, String> {
    let argon2 = params.argon2()?;
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    argon2
        .hash_password_into(passphrase.as_bytes(), salt, &mut key[..])
        .map_err(|e| e.to_string())?;
    Ok(key)
}

/// Write `data` to a sibling temp file, flush it, then link it in as `path`.
/// Fails with `AlreadyExists` if `path` is taken; the temp file is always removed.
fn write_new(dir: &Path, path: &Path, data: &[u8]) -> io::Result<()> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "bad entry path"))?;
    let tmp_path = dir.join(format!(".{}.{:016x}.tmp", file_name, OsRng.next_u64()));

    let result = (|| {
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&tmp_path)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(fs::Permissions::from_mode(0o600))?;
        }

        file.write_all(data)?;
        file.sync_all()?;
        fs::hard_link(&tmp_path, path)
    })();

    let _ = fs::remove_file(&tmp_path);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY_HEX: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const OTHER_KEY_HEX: &str = "59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";

    fn test_vault() -> (tempfile::TempDir, KeyVault) {
        let dir = tempfile::tempdir().unwrap();
        let vault = KeyVault::open(dir.path()).unwrap().with_kdf_params(KdfParams::light());
        (dir, vault)
    }

    #[test]
    fn test_store_and_unlock_roundtrip() {
        let (_dir, vault) = test_vault();
        let key = PrivateKey::from_hex(KEY_HEX).unwrap();

        let account = vault.store("correct horse", &key).unwrap();
        assert_eq!(account.address, key.address().unwrap());
        assert!(account.path.is_file());

        let unlocked = vault.unlock("correct horse", &account.address).unwrap();
        assert_eq!(unlocked, key);
    }

    #[test]
    fn test_wrong_passphrase_fails_closed() {
        let (_dir, vault) = test_vault();
        let key = PrivateKey::from_hex(KEY_HEX).unwrap();
        let account = vault.store("correct horse", &key).unwrap();

        for wrong in ["", "correct hors", "correct horse ", "Correct horse"] {
            assert!(matches!(
                vault.unlock(wrong, &account.address),
                Err(VaultError::WrongPassphrase)
            ));
        }
    }

    #[test]
    fn test_tampered_ciphertext_reports_wrong_passphrase() {
        let (_dir, vault) = test_vault();
        let key = PrivateKey::from_hex(KEY_HEX).unwrap();
        let account = vault.store("pass", &key).unwrap();

        let mut entry: VaultEntry =
            serde_json::from_slice(&fs::read(&account.path).unwrap()).unwrap();
        entry.crypto.ciphertext[0] ^= 0x01;
        fs::write(&account.path, serde_json::to_vec(&entry).unwrap()).unwrap();

        assert!(matches!(
            vault.unlock("pass", &account.address),
            Err(VaultError::WrongPassphrase)
        ));
    }

    #[test]
    fn test_entry_moved_to_other_address_is_rejected() {
        let (_dir, vault) = test_vault();
        let key = PrivateKey::from_hex(KEY_HEX).unwrap();
        let other = PrivateKey::from_hex(OTHER_KEY_HEX).unwrap();
        let account = vault.store("pass", &key).unwrap();

        // Copy the file under the other address and rewrite its address field
        let other_address = other.address().unwrap();
        let mut entry: VaultEntry =
            serde_json::from_slice(&fs::read(&account.path).unwrap()).unwrap();
        entry.address = other_address.to_checksum(None);
        fs::write(vault.entry_path(&other_address), serde_json::to_vec(&entry).unwrap()).unwrap();

        assert!(matches!(
            vault.unlock("pass", &other_address),
            Err(VaultError::WrongPassphrase)
        ));
    }

    #[test]
    fn test_unlock_unknown_address() {
        let (_dir, vault) = test_vault();
        let address = PrivateKey::from_hex(KEY_HEX).unwrap().address().unwrap();
        assert!(matches!(
            vault.unlock("pass", &address),
            Err(VaultError::AddressNotFound(_))
        ));
    }

    #[test]
    fn test_store_rejects_duplicate_address() {
        let (_dir, vault) = test_vault();
        let key = PrivateKey::from_hex(KEY_HEX).unwrap();
        let account = vault.store("first", &key).unwrap();
        let before = fs::read(&account.path).unwrap();

        assert!(matches!(
            vault.store("second", &key),
            Err(VaultError::AlreadyExists(_))
        ));
        assert_eq!(fs::read(&account.path).unwrap(), before);
        assert!(vault.unlock("first", &account.address).is_ok());
    }

    #[test]
    fn test_list_skips_foreign_files() {
        let (dir, vault) = test_vault();
        let a = vault.store("a", &PrivateKey::from_hex(KEY_HEX).unwrap()).unwrap();
        let b = vault.store("b", &PrivateKey::from_hex(OTHER_KEY_HEX).unwrap()).unwrap();

        fs::write(dir.path().join("notes.json"), b"{not a vault entry").unwrap();
        fs::write(dir.path().join("readme.txt"), b"hello").unwrap();
        fs::create_dir(dir.path().join("wallet.db")).unwrap();

        let listed = vault.list().unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed.contains(&a.address));
        assert!(listed.contains(&b.address));
    }

    #[test]
    fn test_delete_requires_passphrase() {
        let (_dir, vault) = test_vault();
        let account = vault.store("pass", &PrivateKey::from_hex(KEY_HEX).unwrap()).unwrap();

        assert!(matches!(
            vault.delete("nope", &account.address),
            Err(VaultError::WrongPassphrase)
        ));
        assert!(vault.contains(&account.address));

        vault.delete("pass", &account.address).unwrap();
        assert!(!vault.contains(&account.address));
    }

    #[test]
    fn test_delete_is_idempotent() {
        let (_dir, vault) = test_vault();
        let account = vault.store("pass", &PrivateKey::from_hex(KEY_HEX).unwrap()).unwrap();

        vault.delete("pass", &account.address).unwrap();
        vault.delete("pass", &account.address).unwrap();
        assert!(vault.list().unwrap().is_empty());
    }

    #[test]
    fn test_entry_is_self_describing() {
        let (_dir, vault) = test_vault();
        let account = vault.store("pass", &PrivateKey::from_hex(KEY_HEX).unwrap()).unwrap();

        let json: serde_json::Value =
            serde_json::from_slice(&fs::read(&account.path).unwrap()).unwrap();
        assert_eq!(json["version"], VAULT_VERSION);
        assert_eq!(json["crypto"]["cipher"], CIPHER_AES_256_GCM);
        assert_eq!(json["crypto"]["kdf"], KDF_ARGON2ID);
        assert_eq!(json["crypto"]["kdfparams"]["m_cost"], 4096);
        assert!(!json.to_string().contains(KEY_HEX));
    }

    #[test]
    fn test_entries_written_with_other_params_still_unlock() {
        let (dir, light) = test_vault();
        let key = PrivateKey::from_hex(KEY_HEX).unwrap();
        let account = light.store("pass", &key).unwrap();

        let reopened = KeyVault::open(dir.path()).unwrap();
        assert_eq!(reopened.unlock("pass", &account.address).unwrap(), key);
    }

    #[test]
    fn test_no_temp_files_left_behind() {
        let (dir, vault) = test_vault();
        vault.store("pass", &PrivateKey::from_hex(KEY_HEX).unwrap()).unwrap();

        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_concurrent_store_keeps_first_entry() {
        use std::sync::{Arc, Barrier};
        use std::thread;

        for _ in 0..4 {
            let (dir, vault) = test_vault();
            let key = PrivateKey::from_hex(KEY_HEX).unwrap();
            let barrier = Arc::new(Barrier::new(2));

            let handles: Vec<_> = ["alpha", "beta"]
                .into_iter()
                .map(|pass| {
                    let vault = vault.clone();
                    let key = key.clone();
                    let barrier = Arc::clone(&barrier);
                    thread::spawn(move || {
                        barrier.wait();
                        (pass, vault.store(pass, &key))
                    })
                })
                .collect();
            let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

            let winners: Vec<_> = results.iter().filter(|(_, r)| r.is_ok()).collect();
            assert_eq!(winners.len(), 1);
            assert!(results
                .iter()
                .any(|(_, r)| matches!(r, Err(VaultError::AlreadyExists(_)))));

            let (pass, account) = winners[0];
            let account = account.as_ref().unwrap();
            assert_eq!(vault.unlock(pass, &account.address).unwrap(), key);
            assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
        }
    }
}
