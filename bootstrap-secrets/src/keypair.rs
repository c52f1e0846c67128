//! RSA keypairs for the AP and component roles.
//!
//! Private keys are encoded as PKCS#1 `RSAPrivateKey`, public keys as
//! `SubjectPublicKeyInfo`, in either DER or PEM form. The two halves are
//! always produced from the same freshly generated key.

use std::fmt;

use log::{debug, info};
use rand_core::{CryptoRng, RngCore};
use rsa::pkcs1::EncodeRsaPrivateKey;
use rsa::pkcs8::{EncodePublicKey, LineEnding};
use rsa::{BigUint, RsaPrivateKey};

use crate::encoding::{EmittedRecord, MacroValue};
use crate::error::{ProvisionError, Result};

pub const PUBLIC_EXPONENT: u64 = 65537;

/// Smallest modulus accepted without the legacy flag.
pub const SECURE_MODULUS_BITS: usize = 2048;

/// Smallest modulus accepted at all, for old test fixtures.
pub const LEGACY_MODULUS_BITS: usize = 512;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyEncoding {
    /// Escaped DER byte strings, for `uint8_t[]` initialisers.
    Der,
    /// PEM armour embedded as a string literal.
    Pem,
}

/// Parameters shared by every keypair of a run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeySpec {
    pub modulus_bits: usize,
    pub exponent: u64,
    pub encoding: KeyEncoding,
    /// Permit moduli between 512 and 2048 bits.
    pub allow_legacy_modulus: bool,
}

impl Default for KeySpec {
    fn default() -> Self {
        Self {
            modulus_bits: SECURE_MODULUS_BITS,
            exponent: PUBLIC_EXPONENT,
            encoding: KeyEncoding::Der,
            allow_legacy_modulus: false,
        }
    }
}

impl KeySpec {
    pub fn validate(&self) -> Result<()> {
        if self.exponent != PUBLIC_EXPONENT {
            return Err(ProvisionError::InvalidConfig(format!(
                "public exponent must be {}, got {}",
                PUBLIC_EXPONENT, self.exponent
            )));
        }
        if self.modulus_bits % 8 != 0 || self.modulus_bits < LEGACY_MODULUS_BITS {
            return Err(ProvisionError::InvalidConfig(format!(
                "modulus must be a multiple of 8 and at least {} bits, got {}",
                LEGACY_MODULUS_BITS, self.modulus_bits
            )));
        }
        if self.modulus_bits < SECURE_MODULUS_BITS && !self.allow_legacy_modulus {
            return Err(ProvisionError::WeakModulusRequested {
                bits: self.modulus_bits,
                minimum: SECURE_MODULUS_BITS,
            });
        }
        Ok(())
    }

    /// Modulus length in bytes, the value of `RSA_KEY_LENGTH`.
    pub fn modulus_bytes(&self) -> usize {
        self.modulus_bits / 8
    }
}

/// One encoded half of a keypair.
#[derive(Clone, PartialEq, Eq)]
pub enum KeyMaterial {
    Der(Vec<u8>),
    Pem(String),
}

impl KeyMaterial {
    pub fn to_macro_value(&self) -> MacroValue {
        match self {
            KeyMaterial::Der(bytes) => MacroValue::Bytes(bytes.clone()),
            KeyMaterial::Pem(text) => MacroValue::Text(text.clone()),
        }
    }

    /// Size of the encoded key in bytes.
    pub fn encoded_len(&self) -> usize {
        match self {
            KeyMaterial::Der(bytes) => bytes.len(),
            KeyMaterial::Pem(text) => text.len(),
        }
    }
}

// Keep key bytes out of debug output.
impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyMaterial::Der(bytes) => write!(f, "Der({} bytes)", bytes.len()),
            KeyMaterial::Pem(text) => write!(f, "Pem({} chars)", text.len()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodedKeypair {
    pub private: KeyMaterial,
    pub public: KeyMaterial,
}

/// Which device a keypair identifies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    Ap,
    /// Component, numbered from 1.
    Comp(u32),
}

impl Role {
    /// `Ap` followed by `Comp(1)..=Comp(comp_count)`.
    pub fn all(comp_count: u32) -> impl Iterator<Item = Role> {
        std::iter::once(Role::Ap).chain((1..=comp_count).map(Role::Comp))
    }

    /// `AP_PRIV`, `AP_PRIV_AT` or `COMP<i>_PRIV`.
    pub fn private_macro(self, ap_at_suffix: bool) -> String {
        match self {
            Role::Ap if ap_at_suffix => "AP_PRIV_AT".to_string(),
            Role::Ap => "AP_PRIV".to_string(),
            Role::Comp(index) => format!("COMP{}_PRIV", index),
        }
    }

    /// `AP_PUB`, `AP_PUB_AT` or `COMP<i>_PUB`.
    pub fn public_macro(self, ap_at_suffix: bool) -> String {
        match self {
            Role::Ap if ap_at_suffix => "AP_PUB_AT".to_string(),
            Role::Ap => "AP_PUB".to_string(),
            Role::Comp(index) => format!("COMP{}_PUB", index),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Ap => write!(f, "AP"),
            Role::Comp(index) => write!(f, "COMP{}", index),
        }
    }
}

#[derive(Clone, Debug)]
pub struct RoleKeypair {
    pub role: Role,
    pub keypair: EncodedKeypair,
}

impl RoleKeypair {
    /// Private record first, then public.
    pub fn records(&self, ap_at_suffix: bool) -> Vec<EmittedRecord> {
        vec![
            EmittedRecord::new(
                self.role.private_macro(ap_at_suffix),
                self.keypair.private.to_macro_value(),
            ),
            EmittedRecord::new(
                self.role.public_macro(ap_at_suffix),
                self.keypair.public.to_macro_value(),
            ),
        ]
    }
}

/// Generate a fresh RSA key and encode both halves.
pub fn generate_keypair<R>(rng: &mut R, spec: &KeySpec) -> Result<EncodedKeypair>
where
    R: RngCore + CryptoRng,
{
    spec.validate()?;

    let exponent = BigUint::from(spec.exponent);
    let private_key = RsaPrivateKey::new_with_exp(rng, spec.modulus_bits, &exponent)?;
    let public_key = private_key.to_public_key();

    let keypair = match spec.encoding {
        KeyEncoding::Der => {
            let private = private_key
                .to_pkcs1_der()
                .map_err(|e| ProvisionError::KeyEncoding(e.to_string()))?;
            let public = public_key
                .to_public_key_der()
                .map_err(|e| ProvisionError::KeyEncoding(e.to_string()))?;
            EncodedKeypair {
                private: KeyMaterial::Der(private.as_bytes().to_vec()),
                public: KeyMaterial::Der(public.as_bytes().to_vec()),
            }
        }
        KeyEncoding::Pem => {
            let private = private_key
                .to_pkcs1_pem(LineEnding::LF)
                .map_err(|e| ProvisionError::KeyEncoding(e.to_string()))?;
            let public = public_key
                .to_public_key_pem(LineEnding::LF)
                .map_err(|e| ProvisionError::KeyEncoding(e.to_string()))?;
            EncodedKeypair {
                private: KeyMaterial::Pem(private.as_str().to_owned()),
                public: KeyMaterial::Pem(public),
            }
        }
    };

    debug!(
        "private key {:?}, public key {:?}",
        keypair.private, keypair.public
    );
    Ok(keypair)
}

pub fn generate_role_keypair<R>(rng: &mut R, spec: &KeySpec, role: Role) -> Result<RoleKeypair>
where
    R: RngCore + CryptoRng,
{
    info!("Generating {}-bit RSA keypair for {}", spec.modulus_bits, role);
    let keypair = generate_keypair(rng, spec)?;
    info!(
        "{} private key size: {} bytes, public key size: {} bytes",
        role,
        keypair.private.encoded_len(),
        keypair.public.encoded_len()
    );
    Ok(RoleKeypair { role, keypair })
}

/// The AP keypair followed by components `1..=comp_count`.
pub fn generate_role_keypairs<R>(
    rng: &mut R,
    spec: &KeySpec,
    comp_count: u32,
) -> Result<Vec<RoleKeypair>>
where
    R: RngCore + CryptoRng,
{
    if comp_count == 0 {
        return Err(ProvisionError::InvalidComponentCount(
            comp_count.to_string(),
        ));
    }
    spec.validate()?;

    Role::all(comp_count)
        .map(|role| generate_role_keypair(rng, spec, role))
        .collect()
}

/// `RSA_KEY_LENGTH`: the modulus size in bytes.
pub fn key_length_record(spec: &KeySpec) -> EmittedRecord {
    EmittedRecord::new(
        "RSA_KEY_LENGTH",
        MacroValue::Decimal(spec.modulus_bytes() as u64),
    )
}
