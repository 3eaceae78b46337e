//! Account directory: human-readable names for vault addresses
//! Lives next to the vault as `wallet.db` and never holds key material
//!
//! sled takes an exclusive file lock for as long as a handle is open, so
//! callers open the directory per operation and `open` waits for a bounded
//! time when another process holds it.

use sled::Db;
use std::collections::BTreeMap;
use std::io;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use wallet::{parse_address, Address};

pub const DIRECTORY_FILE: &str = "wallet.db";

const NAME_PREFIX: &str = "name:";

/// How long `open` waits for another process to release the database.
pub const LOCK_WAIT: Duration = Duration::from_secs(10);

const LOCK_RETRY_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sled::Error),

    #[error("Corrupt entry for {name}: {reason}")]
    Corrupt { name: String, reason: String },

    #[error("Name not found: {0}")]
    NotFound(String),

    #[error("Account directory {0} is in use by another process")]
    Locked(String),
}

/// Name to address mapping
pub struct Directory {
    db: Db,
}

impl Directory {
    /// Open or create the directory database, waiting up to `LOCK_WAIT`
    /// for another holder to let go of it
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, DirectoryError> {
        Self::open_with_timeout(path, LOCK_WAIT)
    }

    pub fn open_with_timeout<P: AsRef<Path>>(
        path: P,
        wait: Duration,
    ) -> Result<Self, DirectoryError> {
        let path = path.as_ref();
        let deadline = Instant::now() + wait;

        loop {
            match sled::open(path) {
                Ok(db) => return Ok(Directory { db }),
                Err(e) if is_lock_contention(&e) => {
                    if Instant::now() >= deadline {
                        return Err(DirectoryError::Locked(path.display().to_string()));
                    }
                    log::debug!("Directory {} is locked, retrying", path.display());
                    thread::sleep(LOCK_RETRY_INTERVAL);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn key(name: &str) -> String {
        format!("{}{}", NAME_PREFIX, name)
    }

    pub fn exists(&self, name: &str) -> Result<bool, DirectoryError> {
        Ok(self.db.contains_key(Self::key(name).as_bytes())?)
    }

    pub fn get(&self, name: &str) -> Result<Address, DirectoryError> {
        match self.db.get(Self::key(name).as_bytes())? {
            Some(value) => decode(name, &value),
            None => Err(DirectoryError::NotFound(name.to_string())),
        }
    }

    /// Save or replace the address for `name`
    pub fn put(&self, name: &str, address: &Address) -> Result<(), DirectoryError> {
        let value = address.to_checksum(None);
        self.db.insert(Self::key(name).as_bytes(), value.as_bytes())?;
        self.db.flush()?;
        Ok(())
    }

    pub fn delete(&self, name: &str) -> Result<(), DirectoryError> {
        self.db.remove(Self::key(name).as_bytes())?;
        self.db.flush()?;
        Ok(())
    }

    /// All names, sorted
    pub fn list_all(&self) -> Result<BTreeMap<String, Address>, DirectoryError> {
        let mut entries = BTreeMap::new();

        for item in self.db.scan_prefix(NAME_PREFIX.as_bytes()) {
            let (key, value) = item?;
            let name = String::from_utf8_lossy(&key[NAME_PREFIX.len()..]).into_owned();
            let address = decode(&name, &value)?;
            entries.insert(name, address);
        }

        Ok(entries)
    }
}

fn is_lock_contention(e: &sled::Error) -> bool {
    match e {
        sled::Error::Io(io_err) => {
            io_err.kind() == io::ErrorKind::WouldBlock
                || io_err.to_string().contains("could not acquire lock")
        }
        _ => false,
    }
}

fn decode(name: &str, value: &[u8]) -> Result<Address, DirectoryError> {
    let corrupt = |reason: String| DirectoryError::Corrupt {
        name: name.to_string(),
        reason,
    };
    let text = std::str::from_utf8(value).map_err(|e| corrupt(e.to_string()))?;
    parse_address(text).map_err(|e| corrupt(e.to_string()))
}
