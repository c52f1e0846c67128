//! Secrets Header Generation Tool
//!
//! This tool generates the shared secrets for one deployment (hashed PIN and
//! TOKEN, nonce/seed values, AP and component RSA keypairs) and writes them
//! as C macros to a header that both firmware images `#include`.
//!
//! Usage:
//!   cargo run --release -- --comp-count 2
//!   cargo run --release -- --encoding pem --no-seeds -o build/global_secrets.h
//!
//! Without `--comp-count` the tool asks for the number of components.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use bootstrap_secrets::credential::{
    DEFAULT_PIN_LENGTH, DEFAULT_TOKEN_LENGTH, PLAINTEXT_LOG_TARGET,
};
use bootstrap_secrets::keypair::{KeyEncoding, PUBLIC_EXPONENT, SECURE_MODULUS_BITS};
use bootstrap_secrets::pipeline::{parse_component_count, provision, ProvisionConfig};
use bootstrap_secrets::writer::{HeaderFile, DEFAULT_HEADER_NAME};
use clap::{Parser, ValueEnum};
use log::{info, log_enabled, warn, Level};
use rand_core::OsRng;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum EncodingArg {
    /// Escaped DER byte strings
    Der,
    /// PEM text
    Pem,
}

impl From<EncodingArg> for KeyEncoding {
    fn from(arg: EncodingArg) -> Self {
        match arg {
            EncodingArg::Der => KeyEncoding::Der,
            EncodingArg::Pem => KeyEncoding::Pem,
        }
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Number of component keypairs (prompted for when omitted)
    #[arg(short, long)]
    comp_count: Option<String>,

    /// Output header file
    #[arg(short, long, default_value = DEFAULT_HEADER_NAME)]
    output: PathBuf,

    /// Key encoding
    #[arg(long, value_enum, default_value_t = EncodingArg::Der)]
    encoding: EncodingArg,

    /// RSA modulus size in bits
    #[arg(long, default_value_t = SECURE_MODULUS_BITS)]
    modulus_bits: usize,

    /// PIN sequence length
    #[arg(long, default_value_t = DEFAULT_PIN_LENGTH)]
    pin_length: usize,

    /// TOKEN sequence length
    #[arg(long, default_value_t = DEFAULT_TOKEN_LENGTH)]
    token_length: usize,

    /// Omit AP_SEED and COMP_SEED
    #[arg(long)]
    no_seeds: bool,

    /// Omit PIN_BUFSIZE and TOKEN_BUFSIZE
    #[arg(long)]
    no_bufsize: bool,

    /// Omit RSA_KEY_LENGTH
    #[arg(long)]
    no_key_length: bool,

    /// Name the AP keys AP_PRIV_AT / AP_PUB_AT (DER only)
    #[arg(long)]
    ap_at_suffix: bool,

    /// Allow moduli below 2048 bits (test fixtures only)
    #[arg(long)]
    legacy_modulus: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);
    require_plaintext_visible(log_enabled!(target: PLAINTEXT_LOG_TARGET, Level::Info))?;

    info!("=== Secrets Header Generation Tool ===");

    let comp_count = match &args.comp_count {
        Some(raw) => parse_component_count(raw)?,
        None => prompt_component_count()?,
    };

    let config = ProvisionConfig {
        pin_length: args.pin_length,
        token_length: args.token_length,
        modulus_bits: args.modulus_bits,
        exponent: PUBLIC_EXPONENT,
        comp_count,
        encoding: args.encoding.into(),
        include_seeds: !args.no_seeds,
        include_bufsize: !args.no_bufsize,
        include_key_length: !args.no_key_length,
        ap_at_suffix: args.ap_at_suffix,
        allow_legacy_modulus: args.legacy_modulus,
    };
    if config.allow_legacy_modulus && config.modulus_bits < SECURE_MODULUS_BITS {
        warn!(
            "Using a {}-bit modulus. Only use this header for test fixtures.",
            config.modulus_bits
        );
    }

    let mut sink = HeaderFile::new(&args.output);
    let report = provision(&config, &mut OsRng, &mut sink)
        .with_context(|| format!("Failed to generate {}", sink.path().display()))?;

    info!(
        "✓ Wrote {} macros to {}",
        report.macro_names.len(),
        sink.path().display()
    );
    for name in &report.macro_names {
        info!("  {}", name);
    }
    info!("Keep {} secret! Do not commit it to a repository.", sink.path().display());

    Ok(())
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .target(env_logger::Target::Stdout)
        .format_timestamp(None)
        .init();
}

/// The plaintext PIN and TOKEN are only ever shown through the log, so a
/// filter that hides them would produce a header nobody can unlock.
fn require_plaintext_visible(visible: bool) -> Result<()> {
    if !visible {
        bail!(
            "info logging is disabled for {}; the PIN and TOKEN would not be shown. \
             Unset RUST_LOG or allow info for that target.",
            PLAINTEXT_LOG_TARGET
        );
    }
    Ok(())
}

/// Ask the operator for the component count on stdin.
fn prompt_component_count() -> Result<u32> {
    print!("Number of components: ");
    io::stdout().flush().context("Failed to flush stdout")?;

    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read component count")?;
    Ok(parse_component_count(&line)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["secrets-gen"]).unwrap();
        assert!(args.comp_count.is_none());
        assert_eq!(args.output, PathBuf::from("global_secrets.h"));
        assert_eq!(KeyEncoding::from(args.encoding), KeyEncoding::Der);
        assert_eq!(args.modulus_bits, 2048);
        assert_eq!((args.pin_length, args.token_length), (12, 15));
        assert!(!args.no_seeds && !args.no_bufsize && !args.no_key_length);
    }

    #[test]
    fn test_hidden_plaintext_refused() {
        assert!(require_plaintext_visible(true).is_ok());
        let err = require_plaintext_visible(false).unwrap_err();
        assert!(err.to_string().contains(PLAINTEXT_LOG_TARGET));
    }

    #[test]
    fn test_pem_without_seeds() {
        let args = Args::try_parse_from([
            "secrets-gen",
            "--comp-count",
            "3",
            "--encoding",
            "pem",
            "--no-seeds",
            "-o",
            "out/secrets.h",
        ])
        .unwrap();
        assert_eq!(args.comp_count.as_deref(), Some("3"));
        assert_eq!(KeyEncoding::from(args.encoding), KeyEncoding::Pem);
        assert!(args.no_seeds);
        assert_eq!(args.output, PathBuf::from("out/secrets.h"));
    }
}
