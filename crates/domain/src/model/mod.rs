//! Data structures shared by the detector, the scan engine and the chain
//! adapters.

use std::collections::HashSet;
use std::fmt;

use hex::encode as hex_encode;
use sha3::{Digest, Keccak256};
use thiserror::Error;

/// Length (in hex characters, without the `0x` prefix) of an EVM address.
pub const ADDRESS_HEX_LENGTH: usize = 40;

/// Width in bytes of a function selector.
pub const SELECTOR_LENGTH: usize = 4;

/// Errors emitted when externally supplied addresses fail validation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AddressFormatError {
    #[error("address must start with `0x`")]
    MissingPrefix,
    #[error("address must be exactly {ADDRESS_HEX_LENGTH} hex characters after `0x`")]
    WrongLength,
    #[error("address contains non-hex characters")]
    NonHex,
}

/// A chain account identifier in its canonical (lowercase) form.
///
/// Every constructor canonicalizes, so two `Address` values compare equal
/// iff their canonical text is equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address(String);

impl Address {
    /// Canonicalizes arbitrary address text. Never fails; use [`Address::parse`]
    /// when the input must be a well-formed EVM address.
    pub fn new(value: impl Into<String>) -> Self {
        let mut owned = value.into();
        owned.make_ascii_lowercase();
        Self(owned)
    }

    /// Validates the `0x` + 40 hex-digit form before canonicalizing.
    pub fn parse(value: &str) -> Result<Self, AddressFormatError> {
        let trimmed = value.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .ok_or(AddressFormatError::MissingPrefix)?;
        if digits.len() != ADDRESS_HEX_LENGTH {
            return Err(AddressFormatError::WrongLength);
        }
        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(AddressFormatError::NonHex);
        }
        Ok(Self::new(format!("0x{digits}")))
    }

    /// Builds an address from its 20 raw bytes.
    pub fn from_bytes(bytes: &[u8; 20]) -> Self {
        Self(format!("0x{}", hex_encode(bytes)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SelectorFormatError {
    #[error("selector must be `0x` followed by {} hex characters", SELECTOR_LENGTH * 2)]
    WrongLength,
    #[error("selector contains non-hex characters")]
    NonHex,
    #[error("function signature must not be empty")]
    EmptySignature,
}

/// Fixed-width call-data prefix identifying a contract function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Selector([u8; SELECTOR_LENGTH]);

impl Selector {
    pub const fn new(bytes: [u8; SELECTOR_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Derives the selector from a canonical signature such as
    /// `work(bytes32,bytes)`: the first four bytes of its Keccak-256 hash.
    pub fn from_signature(signature: &str) -> Result<Self, SelectorFormatError> {
        let signature = signature.trim();
        if signature.is_empty() {
            return Err(SelectorFormatError::EmptySignature);
        }
        let digest = Keccak256::digest(signature.as_bytes());
        let mut bytes = [0u8; SELECTOR_LENGTH];
        bytes.copy_from_slice(&digest[..SELECTOR_LENGTH]);
        Ok(Self(bytes))
    }

    /// Parses a `0x`-prefixed selector literal such as `0x1d2ab000`.
    pub fn from_hex(value: &str) -> Result<Self, SelectorFormatError> {
        let digits = value.trim();
        let digits = digits.strip_prefix("0x").unwrap_or(digits);
        if digits.len() != SELECTOR_LENGTH * 2 {
            return Err(SelectorFormatError::WrongLength);
        }
        let mut bytes = [0u8; SELECTOR_LENGTH];
        hex::decode_to_slice(digits, &mut bytes).map_err(|_| SelectorFormatError::NonHex)?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; SELECTOR_LENGTH] {
        &self.0
    }

    /// Byte-exact prefix test against raw call data.
    pub fn prefixes(&self, data: &[u8]) -> bool {
        data.starts_with(&self.0)
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex_encode(self.0))
    }
}

/// A transaction as seen by the detector. `to` is `None` for contract
/// creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub hash: String,
    pub to: Option<Address>,
    pub data: Vec<u8>,
}

impl Transaction {
    pub fn new(hash: impl Into<String>, to: Option<Address>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            hash: hash.into(),
            to,
            data: data.into(),
        }
    }
}

/// A block and its transactions in chain order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Block {
    pub number: u64,
    pub transactions: Vec<Transaction>,
}

impl Block {
    pub fn new(number: u64, transactions: Vec<Transaction>) -> Self {
        Self {
            number,
            transactions,
        }
    }
}

/// The set of job addresses monitored during a single cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Whitelist(HashSet<Address>);

impl Whitelist {
    pub fn contains(&self, address: &Address) -> bool {
        self.0.contains(address)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Address> for Whitelist {
    fn from_iter<I: IntoIterator<Item = Address>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Outcome of running the detector against one transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Detection {
    Match { job: Address },
    NoMatch,
}

impl Detection {
    pub fn is_match(&self) -> bool {
        matches!(self, Self::Match { .. })
    }

    pub fn job(&self) -> Option<&Address> {
        match self {
            Self::Match { job } => Some(job),
            Self::NoMatch => None,
        }
    }
}
