//! Build-time generator for the secrets an access point (AP) and its
//! components (COMP) share at first boot.
//!
//! A single run produces one C header, conventionally `global_secrets.h`,
//! containing:
//!
//! - SHA-256 digests of a random PIN and TOKEN (the plaintext never reaches
//!   the header),
//! - 64-bit nonce/seed values (`INONCE`, optionally `AP_SEED`/`COMP_SEED`),
//! - one AP RSA keypair and one keypair per component, either as escaped DER
//!   byte strings or as embedded PEM text.
//!
//! Every stage draws from a caller-supplied generator implementing
//! `rand_core::RngCore + CryptoRng` and writes into a caller-supplied
//! [`writer::SecretsSink`]. Production callers pass `OsRng` and a
//! [`writer::HeaderFile`]; tests pass a seeded ChaCha generator and a
//! [`writer::MemorySink`].
//!
//! # Usage
//!
//! ```ignore
//! use bootstrap_secrets::pipeline::{provision, ProvisionConfig};
//! use bootstrap_secrets::writer::HeaderFile;
//! use rand_core::OsRng;
//!
//! let config = ProvisionConfig {
//!     comp_count: 2,
//!     ..ProvisionConfig::default()
//! };
//! let mut sink = HeaderFile::new("global_secrets.h");
//! let report = provision(&config, &mut OsRng, &mut sink)?;
//! println!("wrote {} macros", report.macro_names.len());
//! ```

pub mod credential;
pub mod encoding;
pub mod error;
pub mod keypair;
pub mod pipeline;
pub mod seed;
pub mod writer;

pub use error::{ProvisionError, Result};
pub use pipeline::{provision, ProvisionConfig, ProvisionReport};
