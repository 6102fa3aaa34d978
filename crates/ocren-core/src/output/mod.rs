//! Output assembly: renamed copies, the zip archive and the audit file.

mod archive;
mod assembler;

pub use archive::{audit_path_for, write_archive, write_audit, AUDIT_HEADER, UTF8_BOM};
pub use assembler::{AuditRow, OutputAssembler, COLLISION_NOTE};
