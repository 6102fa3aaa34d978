//! Copy documents into the output tree under their new names.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use tracing::{debug, warn};

use crate::error::ArchiveError;
use crate::models::record::{BatchReport, RenameRecord};

/// Appended to the criterion of a record whose copy was skipped.
pub const COLLISION_NOTE: &str = "(collision: skipped)";

/// One line of the audit file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditRow {
    pub original: String,
    pub new_name: String,
    pub criterion: String,
    pub code: String,
    /// The destination was already taken; nothing was copied.
    pub collision: bool,
}

impl AuditRow {
    fn copied(record: &RenameRecord) -> Self {
        Self {
            original: record.original.clone(),
            new_name: record.new_name.clone(),
            criterion: record.criterion.clone(),
            code: record.code.clone(),
            collision: false,
        }
    }

    fn collided(record: &RenameRecord) -> Self {
        Self {
            criterion: format!("{} {}", record.criterion, COLLISION_NOTE),
            collision: true,
            ..Self::copied(record)
        }
    }
}

/// Copies staged documents into the output tree under their new names.
pub struct OutputAssembler<'a> {
    source_root: &'a Path,
    output_root: &'a Path,
}

impl<'a> OutputAssembler<'a> {
    pub fn new(source_root: &'a Path, output_root: &'a Path) -> Self {
        Self {
            source_root,
            output_root,
        }
    }

    /// Copy every document of `report` under its new name, in discovery order.
    ///
    /// A destination already claimed in this run (compared case-insensitively)
    /// or already present on disk is never overwritten: the later record is
    /// skipped and flagged.
    pub fn assemble(&self, report: &BatchReport) -> Result<Vec<AuditRow>, ArchiveError> {
        let mut records: Vec<&RenameRecord> = report.records.iter().collect();
        records.sort_by_key(|r| r.index);

        let mut claimed: HashSet<String> = HashSet::with_capacity(records.len());
        let mut rows = Vec::with_capacity(records.len());

        for record in records {
            let dest = self.output_root.join(&record.new_name);
            if !claimed.insert(record.new_name.to_lowercase()) || dest.exists() {
                warn!(
                    "{} would overwrite {}, skipping",
                    record.original, record.new_name
                );
                rows.push(AuditRow::collided(record));
                continue;
            }

            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(self.source_root.join(&record.original), &dest)?;
            debug!("Copied {} -> {}", record.original, record.new_name);
            rows.push(AuditRow::copied(record));
        }

        Ok(rows)
    }
}
