//! Zip archive and audit file writers.
//!
//! Both are written to a temporary file next to their destination and only
//! moved into place once complete, so a failed write leaves nothing behind.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use glob::glob;
use tempfile::NamedTempFile;
use tracing::{debug, info};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::AuditRow;
use crate::error::ArchiveError;

/// Byte-order mark so spreadsheet tools detect UTF-8.
pub const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Column names of the audit file.
pub const AUDIT_HEADER: [&str; 4] = ["original", "new_name", "criterion", "detected_code"];

/// The audit file sits next to the archive with a `csv` extension.
pub fn audit_path_for(archive_path: &Path) -> PathBuf {
    archive_path.with_extension("csv")
}

fn temp_in(destination: &Path) -> Result<NamedTempFile, ArchiveError> {
    let dir = match destination.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir)?;
    Ok(tempfile::Builder::new().prefix(".ocren-").tempfile_in(dir)?)
}

/// Zip every file under `output_root` into `archive_path`, entries in sorted
/// relative-path order. Returns the number of entries.
pub fn write_archive(output_root: &Path, archive_path: &Path) -> Result<usize, ArchiveError> {
    let base = glob::Pattern::escape(&output_root.to_string_lossy());
    let mut entries: Vec<(String, PathBuf)> = Vec::new();
    for path in glob(&format!("{}/**/*", base))
        .map_err(|e| ArchiveError::Io(io::Error::new(io::ErrorKind::InvalidInput, e)))?
    {
        let path = path.map_err(|e| ArchiveError::Io(e.into_error()))?;
        if !path.is_file() {
            continue;
        }
        if let Ok(relative) = path.strip_prefix(output_root) {
            let name = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            entries.push((name, path));
        }
    }
    entries.sort();

    let mut temp = temp_in(archive_path)?;
    {
        let mut zip = ZipWriter::new(temp.as_file_mut());
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        for (name, path) in &entries {
            zip.start_file(name.as_str(), options)?;
            io::copy(&mut File::open(path)?, &mut zip)?;
            debug!("Archived {}", name);
        }
        zip.finish()?;
    }

    temp.persist(archive_path)?;
    info!("Wrote {} ({} entries)", archive_path.display(), entries.len());
    Ok(entries.len())
}

/// Write the audit rows to `audit_path` as BOM-prefixed UTF-8 CSV.
pub fn write_audit(rows: &[AuditRow], audit_path: &Path) -> Result<(), ArchiveError> {
    let mut temp = temp_in(audit_path)?;
    temp.write_all(UTF8_BOM)?;
    {
        let mut wtr = csv::Writer::from_writer(temp.as_file_mut());
        wtr.write_record(AUDIT_HEADER)?;
        for row in rows {
            wtr.write_record([&row.original, &row.new_name, &row.criterion, &row.code])?;
        }
        wtr.flush()?;
    }
    temp.persist(audit_path)?;
    info!("Wrote {} ({} rows)", audit_path.display(), rows.len());
    Ok(())
}
