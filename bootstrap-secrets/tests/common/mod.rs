//! Helpers shared by the integration tests.

#![allow(dead_code)]

use bootstrap_secrets::keypair::{KeyEncoding, LEGACY_MODULUS_BITS};
use bootstrap_secrets::ProvisionConfig;
use rand_core::{CryptoRng, Error, RngCore};

/// Small keys so multi-component runs stay quick.
pub fn legacy_config(comp_count: u32, encoding: KeyEncoding) -> ProvisionConfig {
    ProvisionConfig {
        comp_count,
        encoding,
        modulus_bits: LEGACY_MODULUS_BITS,
        allow_legacy_modulus: true,
        ..ProvisionConfig::default()
    }
}

/// Split a rendered header into `(name, raw value)` pairs. Quoted values
/// may span several lines (PEM); they end at the line closing the quote.
pub fn parse_defines(text: &str) -> Vec<(String, String)> {
    let mut defines = Vec::new();
    let mut lines = text.split_inclusive('\n');
    while let Some(line) = lines.next() {
        let rest = line
            .strip_prefix("#define ")
            .unwrap_or_else(|| panic!("not a define: {:?}", line));
        let (name, value) = rest.split_once(' ').expect("define without value");

        let mut value = value.to_string();
        if value.starts_with('"') {
            while !closes_quote(&value) {
                value.push_str(lines.next().expect("unterminated string literal"));
            }
        }
        defines.push((name.to_string(), value.trim_end_matches('\n').to_string()));
    }
    defines
}

fn closes_quote(value: &str) -> bool {
    let trimmed = value.trim_end_matches('\n');
    trimmed.len() >= 2 && trimmed.ends_with('"')
}

pub fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or_else(|| panic!("value is not quoted: {:?}", value))
}

/// Inverse of `escape_bytes`: `\x30\x82...` back to bytes.
pub fn decode_escaped_bytes(escaped: &str) -> Vec<u8> {
    assert!(escaped.is_empty() || escaped.starts_with("\\x"));
    escaped
        .split("\\x")
        .skip(1)
        .map(|pair| {
            assert_eq!(pair.len(), 2, "bad escape {:?}", pair);
            assert_eq!(pair, pair.to_lowercase());
            u8::from_str_radix(pair, 16).expect("hex pair")
        })
        .collect()
}

pub fn value_of<'a>(defines: &'a [(String, String)], name: &str) -> &'a str {
    defines
        .iter()
        .find(|(n, _)| n == name)
        .map(|(_, v)| v.as_str())
        .unwrap_or_else(|| panic!("{} not defined", name))
}

/// Generator whose every request fails, like an exhausted entropy device.
pub struct FailingRng;

impl RngCore for FailingRng {
    fn next_u32(&mut self) -> u32 {
        panic!("entropy source exhausted")
    }

    fn next_u64(&mut self) -> u64 {
        panic!("entropy source exhausted")
    }

    fn fill_bytes(&mut self, _dest: &mut [u8]) {
        panic!("entropy source exhausted")
    }

    fn try_fill_bytes(&mut self, _dest: &mut [u8]) -> Result<(), Error> {
        Err(Error::new("entropy source exhausted"))
    }
}

impl CryptoRng for FailingRng {}

/// Wraps a generator and counts the bytes handed out.
pub struct CountingRng<R> {
    pub inner: R,
    pub bytes_drawn: usize,
}

impl<R> CountingRng<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            bytes_drawn: 0,
        }
    }
}

impl<R: RngCore> RngCore for CountingRng<R> {
    fn next_u32(&mut self) -> u32 {
        self.bytes_drawn += 4;
        self.inner.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.bytes_drawn += 8;
        self.inner.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.bytes_drawn += dest.len();
        self.inner.fill_bytes(dest)
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), Error> {
        self.bytes_drawn += dest.len();
        self.inner.try_fill_bytes(dest)
    }
}

impl<R: CryptoRng> CryptoRng for CountingRng<R> {}
