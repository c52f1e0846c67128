//! Orchestration of a full provisioning run.
//!
//! Stages run strictly in order against one sink:
//!
//! 1. `PIN`, `TOKEN` (each with an optional `_BUFSIZE` companion)
//! 2. `INONCE`, optionally `AP_SEED` and `COMP_SEED`
//! 3. the AP keypair, then `COMP1`..`COMPn`
//! 4. optionally `RSA_KEY_LENGTH`
//!
//! The configuration is validated before the sink is touched, so a bad
//! component count or modulus never truncates an existing header.

use std::collections::BTreeSet;

use log::info;
use rand_core::{CryptoRng, RngCore};

use crate::credential::{
    generate_credential, CredentialKind, DEFAULT_PIN_LENGTH, DEFAULT_TOKEN_LENGTH,
};
use crate::encoding::EmittedRecord;
use crate::error::{ProvisionError, Result};
use crate::keypair::{
    generate_role_keypair, key_length_record, KeyEncoding, KeySpec, Role, PUBLIC_EXPONENT,
    SECURE_MODULUS_BITS,
};
use crate::seed::generate_seeds;
use crate::writer::SecretsSink;

/// Immutable settings for one run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProvisionConfig {
    pub pin_length: usize,
    pub token_length: usize,
    pub modulus_bits: usize,
    pub exponent: u64,
    /// Number of component keypairs, at least 1.
    pub comp_count: u32,
    pub encoding: KeyEncoding,
    /// Emit `AP_SEED` and `COMP_SEED` after `INONCE`.
    pub include_seeds: bool,
    /// Emit `PIN_BUFSIZE` and `TOKEN_BUFSIZE`.
    pub include_bufsize: bool,
    /// Emit `RSA_KEY_LENGTH` at the end.
    pub include_key_length: bool,
    /// Name the AP pair `AP_PRIV_AT`/`AP_PUB_AT`. DER only.
    pub ap_at_suffix: bool,
    /// Allow moduli below 2048 bits for legacy fixtures.
    pub allow_legacy_modulus: bool,
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            pin_length: DEFAULT_PIN_LENGTH,
            token_length: DEFAULT_TOKEN_LENGTH,
            modulus_bits: SECURE_MODULUS_BITS,
            exponent: PUBLIC_EXPONENT,
            comp_count: 1,
            encoding: KeyEncoding::Der,
            include_seeds: true,
            include_bufsize: true,
            include_key_length: true,
            ap_at_suffix: false,
            allow_legacy_modulus: false,
        }
    }
}

impl ProvisionConfig {
    pub fn key_spec(&self) -> KeySpec {
        KeySpec {
            modulus_bits: self.modulus_bits,
            exponent: self.exponent,
            encoding: self.encoding,
            allow_legacy_modulus: self.allow_legacy_modulus,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.comp_count == 0 {
            return Err(ProvisionError::InvalidComponentCount(
                self.comp_count.to_string(),
            ));
        }
        if self.pin_length == 0 || self.token_length == 0 {
            return Err(ProvisionError::InvalidConfig(
                "PIN and TOKEN lengths must be positive".to_string(),
            ));
        }
        if self.ap_at_suffix && self.encoding == KeyEncoding::Pem {
            return Err(ProvisionError::InvalidConfig(
                "AP_PRIV_AT/AP_PUB_AT names only apply to DER encoding".to_string(),
            ));
        }
        self.key_spec().validate()
    }

    /// Macro names a run with this configuration emits, in order.
    pub fn expected_macro_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        for kind in [CredentialKind::Pin, CredentialKind::Token] {
            names.push(kind.macro_name().to_string());
            if self.include_bufsize {
                names.push(kind.bufsize_macro_name().to_string());
            }
        }
        names.push("INONCE".to_string());
        if self.include_seeds {
            names.push("AP_SEED".to_string());
            names.push("COMP_SEED".to_string());
        }
        for role in Role::all(self.comp_count) {
            names.push(role.private_macro(self.ap_at_suffix));
            names.push(role.public_macro(self.ap_at_suffix));
        }
        if self.include_key_length {
            names.push("RSA_KEY_LENGTH".to_string());
        }
        names
    }
}

/// Parse a component count typed by an operator or passed on the command
/// line. Surrounding whitespace is ignored; zero is rejected.
pub fn parse_component_count(input: &str) -> Result<u32> {
    let trimmed = input.trim();
    match trimmed.parse::<u32>() {
        Ok(count) if count > 0 => Ok(count),
        _ => Err(ProvisionError::InvalidComponentCount(trimmed.to_string())),
    }
}

/// Summary of a finished run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProvisionReport {
    /// Emitted macro names in emission order.
    pub macro_names: Vec<String>,
}

/// Forwards record groups to the sink and refuses to emit a name twice.
struct Emitter<'a, S: SecretsSink> {
    sink: &'a mut S,
    seen: BTreeSet<String>,
    report: ProvisionReport,
}

impl<'a, S: SecretsSink> Emitter<'a, S> {
    fn new(sink: &'a mut S) -> Self {
        Self {
            sink,
            seen: BTreeSet::new(),
            report: ProvisionReport::default(),
        }
    }

    fn emit(&mut self, records: &[EmittedRecord]) -> Result<()> {
        for record in records {
            if !self.seen.insert(record.name.clone()) {
                return Err(ProvisionError::DuplicateMacro(record.name.clone()));
            }
        }
        self.sink.append(records)?;
        self.report
            .macro_names
            .extend(records.iter().map(|r| r.name.clone()));
        Ok(())
    }
}

/// Run every stage against `sink`, drawing all randomness from `rng`.
pub fn provision<R, S>(config: &ProvisionConfig, rng: &mut R, sink: &mut S) -> Result<ProvisionReport>
where
    R: RngCore + CryptoRng,
    S: SecretsSink,
{
    config.validate()?;
    let spec = config.key_spec();

    sink.reset()?;
    let mut emitter = Emitter::new(sink);

    for (kind, length) in [
        (CredentialKind::Pin, config.pin_length),
        (CredentialKind::Token, config.token_length),
    ] {
        let credential = generate_credential(rng, kind, length)?;
        emitter.emit(&credential.records(config.include_bufsize))?;
    }

    emitter.emit(&generate_seeds(rng, config.include_seeds)?)?;

    for role in Role::all(config.comp_count) {
        let keypair = generate_role_keypair(rng, &spec, role)?;
        emitter.emit(&keypair.records(config.ap_at_suffix))?;
    }

    if config.include_key_length {
        emitter.emit(&[key_length_record(&spec)])?;
    }

    info!(
        "Provisioned {} macros for 1 AP and {} component(s)",
        emitter.report.macro_names.len(),
        config.comp_count
    );
    Ok(emitter.report)
}
