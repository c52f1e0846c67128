//! PIN and TOKEN generation.
//!
//! A credential is a random sequence of printable ASCII characters drawn by
//! rejection sampling from single random bytes. Only its SHA-256 digest is
//! emitted; the plaintext is logged once for the operator and then wiped.
//!
//! Accepting bytes in `35..=125` keeps 91 of 256 values, so on average about
//! 2.8 bytes are drawn per character. Rejection leaves the accepted values
//! uniformly distributed over the alphabet.

use log::info;
use rand_core::{CryptoRng, RngCore};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::encoding::{EmittedRecord, MacroValue};
use crate::error::{ProvisionError, Result};

/// Lowest accepted code point (`#`).
pub const ALPHABET_START: u8 = 35;
/// Highest accepted code point (`}`).
pub const ALPHABET_END: u8 = 125;

/// Hex length of a SHA-256 digest.
pub const DIGEST_HEX_LEN: usize = 64;

/// Log target of the plaintext sequences. A caller that filters it out at
/// `info` leaves the operator without the PIN and TOKEN.
pub const PLAINTEXT_LOG_TARGET: &str = module_path!();

pub const DEFAULT_PIN_LENGTH: usize = 12;
pub const DEFAULT_TOKEN_LENGTH: usize = 15;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CredentialKind {
    Pin,
    Token,
}

impl CredentialKind {
    pub fn macro_name(self) -> &'static str {
        match self {
            CredentialKind::Pin => "PIN",
            CredentialKind::Token => "TOKEN",
        }
    }

    pub fn bufsize_macro_name(self) -> &'static str {
        match self {
            CredentialKind::Pin => "PIN_BUFSIZE",
            CredentialKind::Token => "TOKEN_BUFSIZE",
        }
    }
}

/// Lowercase hex SHA-256 digest of a credential sequence.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CredentialDigest(String);

impl CredentialDigest {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Clone, Debug)]
pub struct Credential {
    pub kind: CredentialKind,
    pub digest: CredentialDigest,
}

impl Credential {
    /// `PIN`/`TOKEN` bound to the quoted digest, optionally followed by the
    /// `<KIND>_BUFSIZE` companion holding the digest length.
    pub fn records(&self, include_bufsize: bool) -> Vec<EmittedRecord> {
        let mut records = vec![EmittedRecord::new(
            self.kind.macro_name(),
            MacroValue::Text(self.digest.as_str().to_string()),
        )];
        if include_bufsize {
            records.push(EmittedRecord::new(
                self.kind.bufsize_macro_name(),
                MacroValue::Decimal(self.digest.len() as u64),
            ));
        }
        records
    }
}

pub fn is_alphabet_byte(byte: u8) -> bool {
    (ALPHABET_START..=ALPHABET_END).contains(&byte)
}

/// Draw a printable sequence of exactly `target_length` characters.
pub fn generate_sequence<R>(rng: &mut R, target_length: usize) -> Result<Zeroizing<String>>
where
    R: RngCore + CryptoRng,
{
    if target_length == 0 {
        return Err(ProvisionError::InvalidConfig(
            "credential length must be positive".to_string(),
        ));
    }

    let mut sequence = Zeroizing::new(String::with_capacity(target_length));
    let mut byte = [0u8; 1];
    while sequence.len() < target_length {
        rng.try_fill_bytes(&mut byte)?;
        if is_alphabet_byte(byte[0]) {
            sequence.push(byte[0] as char);
        }
    }
    Ok(sequence)
}

pub fn digest_sequence(sequence: &str) -> CredentialDigest {
    let digest = Sha256::digest(sequence.as_bytes());
    CredentialDigest(hex::encode(digest))
}

/// Generate one credential and return its digest.
///
/// The plaintext goes to the log so the operator can record it; it is
/// zeroed before this function returns.
pub fn generate_credential<R>(
    rng: &mut R,
    kind: CredentialKind,
    target_length: usize,
) -> Result<Credential>
where
    R: RngCore + CryptoRng,
{
    info!("Generating {} sequence of size {}", kind.macro_name(), target_length);
    let sequence = generate_sequence(rng, target_length)?;
    info!(
        target: PLAINTEXT_LOG_TARGET,
        "{} SEQUENCE -> > {} <",
        kind.macro_name(),
        sequence.as_str()
    );

    let digest = digest_sequence(&sequence);
    info!("{} digest = {}", kind.macro_name(), digest.as_str());

    Ok(Credential { kind, digest })
}
