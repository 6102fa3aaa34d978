//! End-to-end batch: stage the input, extract codes, package the output.

use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::batch::{discover, stage_input, BatchScheduler, ExtractionBackend, ProgressSink, Workspace};
use crate::error::{OcrenError, Result};
use crate::models::config::OcrenConfig;
use crate::models::record::BatchReport;
use crate::output::{audit_path_for, write_archive, write_audit, AuditRow, OutputAssembler};

/// What to process and where to put the result.
#[derive(Debug, Clone)]
pub struct BatchRequest {
    /// Directory tree or `.zip` archive of documents.
    pub input: PathBuf,
    /// Destination of the output archive. The audit file is written next to it.
    pub archive: PathBuf,
    pub config: OcrenConfig,
}

/// Outcome of a completed batch.
#[derive(Debug, Clone)]
pub struct BatchSummary {
    pub report: BatchReport,
    pub rows: Vec<AuditRow>,
    pub archive: PathBuf,
    pub audit: PathBuf,
    pub elapsed: Duration,
}

impl BatchSummary {
    /// Documents whose copy was skipped because the name was taken.
    pub fn collisions(&self) -> usize {
        self.rows.iter().filter(|r| r.collision).count()
    }
}

/// Run one batch.
///
/// Input, configuration and engine problems abort before any document is
/// processed. Per-document failures end up in the report. Packaging failures
/// abort without leaving an archive or audit file behind. The temporary
/// workspace is removed on every path out of this function.
pub fn run_batch<B: ExtractionBackend>(
    request: &BatchRequest,
    backend: &B,
    sink: &mut dyn ProgressSink,
) -> Result<BatchSummary> {
    let started = Instant::now();
    request.config.validate()?;
    let audit = audit_path_for(&request.archive);
    if request
        .archive
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
    {
        return Err(OcrenError::Config(format!(
            "output archive {} would be overwritten by its audit file; use a .zip name",
            request.archive.display()
        )));
    }

    let workspace = Workspace::new()?;
    stage_input(&request.input, workspace.input_dir())?;

    let documents = discover(workspace.input_dir())?;
    if documents.is_empty() {
        return Err(OcrenError::NoDocuments(request.input.clone()));
    }

    // Fail fast when the engine cannot be built at all
    backend.recognizer()?;

    let scheduler = BatchScheduler::from_config(&request.config);
    info!(
        "Processing {} documents with {} workers",
        documents.len(),
        scheduler.workers()
    );
    let report = scheduler.run(&documents, backend, sink);

    let rows = OutputAssembler::new(workspace.input_dir(), workspace.output_dir()).assemble(&report)?;

    write_archive(workspace.output_dir(), &request.archive)?;
    if let Err(e) = write_audit(&rows, &audit) {
        warn!("Removing {} after audit failure", request.archive.display());
        let _ = fs::remove_file(&request.archive);
        return Err(e.into());
    }

    let elapsed = started.elapsed();
    info!(
        "Renamed {} of {} documents in {:.1?}",
        report.found(),
        report.len(),
        elapsed
    );

    Ok(BatchSummary {
        report,
        rows,
        archive: request.archive.clone(),
        audit,
        elapsed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::ProgressEvent;
    use crate::error::InputError;
    use crate::models::config::WorkerCount;
    use crate::models::record::RenameRecord;
    use crate::output::UTF8_BOM;
    use crate::testing::ScriptedBackend;
    use pretty_assertions::assert_eq;
    use std::fs::File;
    use std::io::Read;
    use std::num::NonZeroUsize;
    use zip::ZipArchive;

    const CODE: &str = "00202505011601234567";

    fn request(input: PathBuf, archive: PathBuf) -> BatchRequest {
        let mut config = OcrenConfig::default();
        config.batch.workers = WorkerCount::Fixed(NonZeroUsize::new(2).unwrap());
        BatchRequest {
            input,
            archive,
            config,
        }
    }

    fn write(root: &std::path::Path, relative: &str, script: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, script).unwrap();
    }

    fn no_progress() -> impl FnMut(&RenameRecord, &ProgressEvent) {
        |_: &RenameRecord, _: &ProgressEvent| {}
    }

    fn archive_entries(path: &std::path::Path) -> Vec<String> {
        let mut archive = ZipArchive::new(File::open(path).unwrap()).unwrap();
        (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect()
    }

    fn audit_lines(path: &std::path::Path) -> Vec<String> {
        let bytes = fs::read(path).unwrap();
        assert!(bytes.starts_with(UTF8_BOM));
        String::from_utf8(bytes[UTF8_BOM.len()..].to_vec())
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_batch_renames_and_flags_collision() {
        let input = tempfile::tempdir().unwrap();
        write(input.path(), "a.pdf", &format!("1 0 {}", CODE));
        write(input.path(), "b.pdf", "1 1 nothing here");
        write(input.path(), "c.pdf", "1 full 002025 0501 1601 2345 67 99");
        let out = tempfile::tempdir().unwrap();
        let archive = out.path().join("renamed.zip");

        let backend = ScriptedBackend::new();
        let mut events = Vec::new();
        let mut sink = |record: &RenameRecord, event: &ProgressEvent| {
            events.push((record.original.clone(), event.completed, event.total));
        };
        let summary = run_batch(&request(input.path().to_path_buf(), archive.clone()), &backend, &mut sink).unwrap();

        assert_eq!(summary.report.len(), 3);
        assert_eq!(summary.report.found(), 2);
        assert_eq!(summary.collisions(), 1);
        assert_eq!(events.len(), 3);
        assert!(events.iter().all(|(_, _, total)| *total == 3));

        assert_eq!(archive_entries(&archive), vec![format!("{}.pdf", CODE), "b.pdf".to_string()]);
        assert_eq!(summary.audit, out.path().join("renamed.csv"));
        assert_eq!(
            audit_lines(&summary.audit),
            vec![
                "original,new_name,criterion,detected_code".to_string(),
                format!("a.pdf,{}.pdf,region[0] p1 300dpi literal,{}", CODE, CODE),
                "b.pdf,b.pdf,not found,".to_string(),
                format!(
                    "c.pdf,{}.pdf,full p1 300dpi segmented (collision: skipped),{}",
                    CODE, CODE
                ),
            ]
        );
    }

    #[test]
    fn test_batch_keeps_going_after_failures() {
        let input = tempfile::tempdir().unwrap();
        write(input.path(), "bad/broken.pdf", "fail-open");
        write(input.path(), "good.PDF", &format!("1 2 {}", CODE));
        write(input.path(), "notes.txt", "ignored");
        let out = tempfile::tempdir().unwrap();
        let archive = out.path().join("out.zip");

        let backend = ScriptedBackend::new();
        let summary = run_batch(&request(input.path().to_path_buf(), archive.clone()), &backend, &mut no_progress()).unwrap();

        assert_eq!(summary.report.len(), 2);
        let broken = &summary.report.records[0];
        assert_eq!(broken.original, "bad/broken.pdf");
        assert_eq!(broken.new_name, "bad/broken.pdf");
        assert!(broken.criterion.starts_with("open error:"));
        assert_eq!(
            archive_entries(&archive),
            vec![format!("{}.PDF", CODE), "bad/broken.pdf".to_string()]
        );
    }

    #[test]
    fn test_batch_from_zip_input() {
        let staging = tempfile::tempdir().unwrap();
        let zip_path = staging.path().join("scans.zip");
        {
            let mut zip = zip::ZipWriter::new(File::create(&zip_path).unwrap());
            let options = zip::write::SimpleFileOptions::default();
            zip.start_file("scans/one.pdf", options).unwrap();
            std::io::Write::write_all(&mut zip, format!("1 0 {}", CODE).as_bytes()).unwrap();
            zip.finish().unwrap();
        }
        let out = tempfile::tempdir().unwrap();
        let archive = out.path().join("out.zip");

        let backend = ScriptedBackend::new();
        let summary = run_batch(&request(zip_path, archive.clone()), &backend, &mut no_progress()).unwrap();

        assert_eq!(summary.report.found(), 1);
        assert_eq!(archive_entries(&archive), vec![format!("scans/{}.pdf", CODE)]);

        let mut content = String::new();
        ZipArchive::new(File::open(&archive).unwrap())
            .unwrap()
            .by_index(0)
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, format!("1 0 {}", CODE));
    }

    #[test]
    fn test_missing_input_fails_before_work() {
        let out = tempfile::tempdir().unwrap();
        let archive = out.path().join("out.zip");
        let backend = ScriptedBackend::new();

        let err = run_batch(
            &request(out.path().join("nope"), archive.clone()),
            &backend,
            &mut no_progress(),
        )
        .err()
        .unwrap();

        assert!(matches!(err, OcrenError::Input(InputError::NotFound(_))));
        assert_eq!(backend.opened(), 0);
        assert!(!archive.exists());
    }

    #[test]
    fn test_empty_input_reports_no_documents() {
        let input = tempfile::tempdir().unwrap();
        write(input.path(), "readme.txt", "no documents");
        let out = tempfile::tempdir().unwrap();
        let archive = out.path().join("out.zip");

        let err = run_batch(
            &request(input.path().to_path_buf(), archive.clone()),
            &ScriptedBackend::new(),
            &mut no_progress(),
        )
        .err()
        .unwrap();

        assert!(matches!(err, OcrenError::NoDocuments(_)));
        assert!(!archive.exists());
    }

    #[test]
    fn test_engine_failure_aborts_before_scheduling() {
        let input = tempfile::tempdir().unwrap();
        write(input.path(), "a.pdf", "");
        let out = tempfile::tempdir().unwrap();
        let archive = out.path().join("out.zip");
        let backend = ScriptedBackend::new().with_failing_recognizer();

        let err = run_batch(&request(input.path().to_path_buf(), archive.clone()), &backend, &mut no_progress())
            .err()
            .unwrap();

        assert!(matches!(err, OcrenError::Ocr(_)));
        assert_eq!(backend.opened(), 0);
        assert!(!archive.exists());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let input = tempfile::tempdir().unwrap();
        write(input.path(), "a.pdf", "");
        let out = tempfile::tempdir().unwrap();
        let mut req = request(input.path().to_path_buf(), out.path().join("out.zip"));
        req.config.render.pages = 0;

        let err = run_batch(&req, &ScriptedBackend::new(), &mut no_progress()).err().unwrap();
        assert!(matches!(err, OcrenError::Config(_)));
    }

    #[test]
    fn test_archive_named_like_audit_rejected() {
        let input = tempfile::tempdir().unwrap();
        write(input.path(), "a.pdf", &format!("1 0 {}", CODE));
        let out = tempfile::tempdir().unwrap();
        let backend = ScriptedBackend::new();

        for name in ["renamed.csv", "renamed.CSV"] {
            let err = run_batch(
                &request(input.path().to_path_buf(), out.path().join(name)),
                &backend,
                &mut no_progress(),
            )
            .err()
            .unwrap();
            assert!(matches!(err, OcrenError::Config(_)));
        }

        assert_eq!(backend.opened(), 0);
        assert_eq!(fs::read_dir(out.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_repeated_batch_gives_same_names() {
        let input = tempfile::tempdir().unwrap();
        write(input.path(), "a.pdf", &format!("1 0 {}", CODE));
        write(input.path(), "b.pdf", "1 1 nothing here");
        write(input.path(), "sub/c.pdf", "pages 2\n2 1 002025 O5O1 16O1 2345 68");
        write(input.path(), "sub/d.pdf", "1 2 00202599998888777766");
        let out = tempfile::tempdir().unwrap();
        let backend = ScriptedBackend::new();

        let names = |archive: &str| {
            let summary = run_batch(
                &request(input.path().to_path_buf(), out.path().join(archive)),
                &backend,
                &mut no_progress(),
            )
            .unwrap();
            summary
                .report
                .records
                .iter()
                .map(|r| (r.original.clone(), r.new_name.clone(), r.code.clone()))
                .collect::<Vec<_>>()
        };

        let first = names("first.zip");
        let second = names("second.zip");
        assert_eq!(first, second);
        assert_eq!(first.iter().filter(|(_, _, code)| !code.is_empty()).count(), 3);
        assert_eq!(
            archive_entries(&out.path().join("first.zip")),
            archive_entries(&out.path().join("second.zip"))
        );
    }
}
