//! 64-bit nonce and seed values consumed by on-device PRNG setup.

use log::debug;
use rand_core::{CryptoRng, RngCore};

use crate::encoding::{EmittedRecord, MacroValue};
use crate::error::Result;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SeedName {
    Inonce,
    ApSeed,
    CompSeed,
}

impl SeedName {
    pub fn macro_name(self) -> &'static str {
        match self {
            SeedName::Inonce => "INONCE",
            SeedName::ApSeed => "AP_SEED",
            SeedName::CompSeed => "COMP_SEED",
        }
    }

    /// Seeds emitted for a run, in emission order.
    pub fn enabled(include_seeds: bool) -> &'static [SeedName] {
        if include_seeds {
            &[SeedName::Inonce, SeedName::ApSeed, SeedName::CompSeed]
        } else {
            &[SeedName::Inonce]
        }
    }
}

/// Eight secure random bytes read as a little-endian `u64`.
pub fn generate_random_u64<R>(rng: &mut R) -> Result<u64>
where
    R: RngCore + CryptoRng,
{
    let mut bytes = [0u8; 8];
    rng.try_fill_bytes(&mut bytes)?;
    Ok(u64::from_le_bytes(bytes))
}

pub fn generate_seed<R>(rng: &mut R, name: SeedName) -> Result<EmittedRecord>
where
    R: RngCore + CryptoRng,
{
    let value = generate_random_u64(rng)?;
    debug!("{} = {:#x}", name.macro_name(), value);
    Ok(EmittedRecord::new(name.macro_name(), MacroValue::Hex(value)))
}

/// `INONCE`, plus `AP_SEED` and `COMP_SEED` when `include_seeds` is set.
pub fn generate_seeds<R>(rng: &mut R, include_seeds: bool) -> Result<Vec<EmittedRecord>>
where
    R: RngCore + CryptoRng,
{
    SeedName::enabled(include_seeds)
        .iter()
        .map(|name| generate_seed(rng, *name))
        .collect()
}
