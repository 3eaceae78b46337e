//! BIP-39 recovery phrases and seeds
//!
//! Every phrase produced here encodes 256 bits of entropy (24 words). Any
//! valid English BIP-39 phrase is accepted on import.

use bip39::{Language, Mnemonic};
use rand::rngs::OsRng;
use rand::RngCore;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// Entropy drawn for a new phrase.
pub const MNEMONIC_ENTROPY_BYTES: usize = 32;

/// Words in a newly generated phrase.
pub const MNEMONIC_WORD_COUNT: usize = 24;

#[derive(Debug, Error)]
pub enum MnemonicError {
    #[error("Entropy source unavailable: {0}")]
    Entropy(String),

    #[error("Invalid mnemonic phrase: {0}")]
    InvalidMnemonic(String),
}

/// 512-bit BIP-39 seed. Wiped on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct Seed([u8; 64]);

impl Seed {
    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }
}

impl std::fmt::Debug for Seed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Seed").field(&"[REDACTED]").finish()
    }
}

/// Generate a fresh 24-word phrase from the operating system's RNG.
pub fn generate_mnemonic() -> Result<MnemonicPhrase, MnemonicError> {
    let mut entropy = Zeroizing::new([0u8; MNEMONIC_ENTROPY_BYTES]);
    OsRng
        .try_fill_bytes(&mut entropy[..])
        .map_err(|e| MnemonicError::Entropy(e.to_string()))?;

    let mnemonic = Mnemonic::from_entropy_in(Language::English, &entropy[..])
        .map_err(|e| MnemonicError::InvalidMnemonic(e.to_string()))?;

    Ok(MnemonicPhrase {
        phrase: Zeroizing::new(mnemonic.to_string()),
    })
}

/// Validate a mnemonic phrase (word list membership and checksum).
pub fn validate_mnemonic(phrase: &str) -> Result<(), MnemonicError> {
    parse(phrase).map(|_| ())
}

/// Derive the BIP-39 seed from a phrase and optional passphrase ("" for none).
///
/// # Example
/// ```
/// use wallet::mnemonic::seed_from_mnemonic;
///
/// let words = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";
/// let seed = seed_from_mnemonic(words, "").unwrap();
/// assert_eq!(seed.as_bytes().len(), 64);
/// ```
pub fn seed_from_mnemonic(phrase: &str, passphrase: &str) -> Result<Seed, MnemonicError> {
    let mnemonic = parse(phrase)?;
    Ok(Seed(mnemonic.to_seed(passphrase)))
}

fn parse(phrase: &str) -> Result<Mnemonic, MnemonicError> {
    // Collapse runs of whitespace so pasted phrases still parse
    let normalized = phrase.split_whitespace().collect::<Vec<_>>().join(" ");
    Mnemonic::parse_in(Language::English, normalized.as_str())
        .map_err(|e| MnemonicError::InvalidMnemonic(e.to_string()))
}

/// Mnemonic wrapper for convenience
#[derive(Clone)]
pub struct MnemonicPhrase {
    phrase: Zeroizing<String>,
}

impl MnemonicPhrase {
    /// Create from an existing phrase
    pub fn from_phrase(phrase: &str) -> Result<Self, MnemonicError> {
        let mnemonic = parse(phrase)?;
        Ok(Self {
            phrase: Zeroizing::new(mnemonic.to_string()),
        })
    }

    /// Get the phrase as a string
    pub fn phrase(&self) -> &str {
        &self.phrase
    }

    /// Get word count
    pub fn word_count(&self) -> usize {
        self.phrase.split_whitespace().count()
    }

    /// Derive the seed for this phrase
    pub fn to_seed(&self, passphrase: &str) -> Result<Seed, MnemonicError> {
        seed_from_mnemonic(&self.phrase, passphrase)
    }
}

impl std::fmt::Display for MnemonicPhrase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.phrase.as_str())
    }
}

impl std::fmt::Debug for MnemonicPhrase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MnemonicPhrase")
            .field("words", &self.word_count())
            .finish_non_exhaustive()
    }
}
