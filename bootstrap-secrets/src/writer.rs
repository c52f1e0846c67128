//! Output sinks for the secrets header.
//!
//! A sink is reset exactly once at the start of a run and then receives
//! record groups in generation order. [`HeaderFile`] keeps one handle open
//! for the whole run and flushes after every group, so a failure mid-run
//! leaves everything before it on disk. Such a partial header is never valid;
//! the next run's `reset` truncates it.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use log::debug;

use crate::encoding::EmittedRecord;
use crate::error::{ProvisionError, Result};

pub const DEFAULT_HEADER_NAME: &str = "global_secrets.h";

/// Destination for rendered records.
pub trait SecretsSink {
    /// Create or truncate the artifact. Called once per run, before any
    /// secret is generated.
    fn reset(&mut self) -> Result<()>;

    /// Append a group of records and make them durable before returning.
    fn append(&mut self, records: &[EmittedRecord]) -> Result<()>;
}

/// Concatenated `#define` lines for `records`.
pub fn render_header(records: &[EmittedRecord]) -> Result<String> {
    records.iter().map(EmittedRecord::render).collect()
}

/// Header file on disk.
///
/// On Unix the file is left with mode 0600 after `reset`, whether it was
/// created or already existed, since it carries private keys.
pub struct HeaderFile {
    path: PathBuf,
    file: Option<File>,
}

impl HeaderFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn unwritable(&self, source: io::Error) -> ProvisionError {
        ProvisionError::SinkUnwritable {
            path: self.path.clone(),
            source,
        }
    }
}

impl SecretsSink for HeaderFile {
    fn reset(&mut self) -> Result<()> {
        // drop any handle from an earlier run first
        self.file = None;

        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let file = options.open(&self.path).map_err(|e| self.unwritable(e))?;
        // `mode` only applies on creation; tighten a pre-existing header too
        restrict_to_owner(&file).map_err(|e| self.unwritable(e))?;
        debug!("Truncated {}", self.path.display());
        self.file = Some(file);
        Ok(())
    }

    fn append(&mut self, records: &[EmittedRecord]) -> Result<()> {
        let text = render_header(records)?;
        let result = match self.file.as_mut() {
            Some(file) => write_durably(file, text.as_bytes()),
            None => Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "append before reset",
            )),
        };
        result.map_err(|e| self.unwritable(e))?;
        debug!("Appended {} record(s) to {}", records.len(), self.path.display());
        Ok(())
    }
}

#[cfg(unix)]
fn restrict_to_owner(file: &File) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    file.set_permissions(std::fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_to_owner(_file: &File) -> io::Result<()> {
    log::warn!("Cannot restrict header permissions on this platform");
    Ok(())
}

fn write_durably(file: &mut File, bytes: &[u8]) -> io::Result<()> {
    file.write_all(bytes)?;
    file.flush()?;
    file.sync_data()
}

/// In-memory sink for tests and dry runs.
#[derive(Default)]
pub struct MemorySink {
    pub records: Vec<EmittedRecord>,
    pub text: String,
    pub resets: usize,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SecretsSink for MemorySink {
    fn reset(&mut self) -> Result<()> {
        self.records.clear();
        self.text.clear();
        self.resets += 1;
        Ok(())
    }

    fn append(&mut self, records: &[EmittedRecord]) -> Result<()> {
        self.text.push_str(&render_header(records)?);
        self.records.extend_from_slice(records);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::MacroValue;
    use std::fs;

    fn sample_records() -> Vec<EmittedRecord> {
        vec![
            EmittedRecord::new("PIN", MacroValue::Text("00ff".into())),
            EmittedRecord::new("PIN_BUFSIZE", MacroValue::Decimal(4)),
        ]
    }

    #[test]
    fn test_render_header() {
        assert_eq!(
            render_header(&sample_records()).unwrap(),
            "#define PIN \"00ff\"\n#define PIN_BUFSIZE 4\n"
        );
    }

    #[test]
    fn test_header_file_reset_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_HEADER_NAME);
        fs::write(&path, "stale contents from a previous run\n").unwrap();

        let mut sink = HeaderFile::new(&path);
        sink.reset().unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "");

        sink.append(&sample_records()).unwrap();
        sink.append(&[EmittedRecord::new("INONCE", MacroValue::Hex(0x10))])
            .unwrap();
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "#define PIN \"00ff\"\n#define PIN_BUFSIZE 4\n#define INONCE 0x10\n"
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_header_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_HEADER_NAME);
        let mut sink = HeaderFile::new(&path);
        sink.reset().unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o077, 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_existing_readable_header_is_tightened() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_HEADER_NAME);
        fs::write(&path, "#define PIN \"old\"\n").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();

        let mut sink = HeaderFile::new(&path);
        sink.reset().unwrap();
        sink.append(&sample_records()).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "#define PIN \"00ff\"\n#define PIN_BUFSIZE 4\n"
        );
    }

    #[test]
    fn test_append_before_reset_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = HeaderFile::new(dir.path().join(DEFAULT_HEADER_NAME));
        assert!(matches!(
            sink.append(&sample_records()),
            Err(ProvisionError::SinkUnwritable { .. })
        ));
    }

    #[test]
    fn test_unwritable_path_detected_at_reset() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = HeaderFile::new(dir.path().join("missing").join(DEFAULT_HEADER_NAME));
        let err = sink.reset().unwrap_err();
        assert!(matches!(err, ProvisionError::SinkUnwritable { .. }));
        assert!(err.to_string().contains(DEFAULT_HEADER_NAME));
    }

    #[test]
    fn test_bad_record_is_not_written() {
        let mut sink = MemorySink::new();
        sink.reset().unwrap();
        let bad = [EmittedRecord::new("bad name", MacroValue::Decimal(1))];
        assert!(sink.append(&bad).is_err());
        assert!(sink.records.is_empty());
        assert!(sink.text.is_empty());
    }
}
