//! Bounded worker pool running one extraction task per document.
//!
//! ```text
//! [feeder] --chunks--> bounded queue --> [worker 1..n] --records--> [caller]
//! ```
//!
//! Workers never share mutable state. Each owns its recognizer and sends
//! finished records back as messages; only the calling thread touches the
//! progress sink.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::thread;
use std::time::Instant;

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use tracing::{debug, info, warn};

use super::{Document, ExtractionBackend, ProgressEvent, ProgressSink};
use crate::extract::CodeExtractor;
use crate::models::config::{OcrenConfig, WorkerCount};
use crate::models::record::{BatchReport, ExtractionResult, FailureKind, RenameRecord};

/// Documents handed to a worker per dispatch.
pub const DEFAULT_CHUNK_SIZE: usize = 2;

/// A slice of documents and the batch position of its first element.
type Chunk<'a> = (usize, &'a [Document]);

/// Dispatches documents to a pool of parallel workers.
#[derive(Debug, Clone, Copy)]
pub struct BatchScheduler {
    extractor: CodeExtractor,
    workers: usize,
    chunk_size: usize,
}

impl BatchScheduler {
    /// Create a scheduler; `workers` is resolved immediately.
    pub fn new(extractor: CodeExtractor, workers: WorkerCount) -> Self {
        Self {
            extractor,
            workers: workers.resolve(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Build a scheduler from the render and batch sections of `config`.
    pub fn from_config(config: &OcrenConfig) -> Self {
        Self::new(
            CodeExtractor::new(config.render.dpi, config.render.pages),
            config.batch.workers,
        )
        .with_chunk_size(config.batch.chunk_size)
    }

    /// Set how many documents a worker takes per dispatch (at least 1).
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Process every document and return one record per document, in the
    /// order of `documents`.
    ///
    /// Per-document failures become records; nothing here aborts the batch.
    /// `sink` receives one event per completed document in completion order.
    pub fn run<B: ExtractionBackend>(
        &self,
        documents: &[Document],
        backend: &B,
        sink: &mut dyn ProgressSink,
    ) -> BatchReport {
        let total = documents.len();
        if total == 0 {
            return BatchReport::default();
        }

        let start = Instant::now();
        let workers = self.workers.min(total.div_ceil(self.chunk_size)).max(1);
        info!(
            "Processing {} documents with {} workers (chunks of {})",
            total, workers, self.chunk_size
        );

        let (task_tx, task_rx) = bounded::<Chunk<'_>>(workers * 2);
        let (result_tx, result_rx) = unbounded::<(usize, RenameRecord)>();
        let mut slots: Vec<Option<RenameRecord>> = vec![None; total];
        let chunk_size = self.chunk_size;
        let extractor = self.extractor;

        thread::scope(|scope| {
            scope.spawn(move || {
                for (i, chunk) in documents.chunks(chunk_size).enumerate() {
                    if task_tx.send((i * chunk_size, chunk)).is_err() {
                        break;
                    }
                }
            });

            for worker_id in 0..workers {
                let tasks = task_rx.clone();
                let results = result_tx.clone();
                scope.spawn(move || worker_loop(worker_id, extractor, backend, tasks, results));
            }
            drop(task_rx);
            drop(result_tx);

            let mut completed = 0;
            for (slot, record) in result_rx.iter() {
                completed += 1;
                let event = ProgressEvent::new(completed, total, start.elapsed());
                sink.on_progress(&record, &event);
                slots[slot] = Some(record);
            }
        });

        let records = slots
            .into_iter()
            .zip(documents)
            .map(|(slot, document)| {
                slot.unwrap_or_else(|| {
                    warn!("No result for {}, worker terminated", document.relative);
                    RenameRecord::failed(document, FailureKind::Panic, "worker terminated")
                })
            })
            .collect();

        info!("Batch finished in {:?}", start.elapsed());
        BatchReport { records }
    }
}

fn worker_loop<B: ExtractionBackend>(
    worker_id: usize,
    extractor: CodeExtractor,
    backend: &B,
    tasks: Receiver<Chunk<'_>>,
    results: Sender<(usize, RenameRecord)>,
) {
    let recognizer = match catch_unwind(AssertUnwindSafe(|| backend.recognizer())) {
        Ok(Ok(recognizer)) => Ok(recognizer),
        Ok(Err(e)) => Err(e.to_string()),
        Err(payload) => Err(panic_message(payload.as_ref())),
    };
    if let Err(e) = &recognizer {
        warn!("Worker {} has no recognizer: {}", worker_id, e);
    }

    for (offset, chunk) in tasks.iter() {
        for (i, document) in chunk.iter().enumerate() {
            let record = match &recognizer {
                Ok(recognizer) => run_task(&extractor, backend, recognizer, document),
                Err(e) => RenameRecord::failed(document, FailureKind::Recognizer, e.clone()),
            };
            if results.send((offset + i, record)).is_err() {
                return;
            }
        }
    }
    debug!("Worker {} finished", worker_id);
}

/// Run one document, converting every failure into a record.
fn run_task<B: ExtractionBackend>(
    extractor: &CodeExtractor,
    backend: &B,
    recognizer: &B::Recognizer,
    document: &Document,
) -> RenameRecord {
    let outcome = catch_unwind(AssertUnwindSafe(|| -> Result<ExtractionResult, (FailureKind, String)> {
        let renderer = backend
            .open(&document.path)
            .map_err(|e| (FailureKind::Open, e.to_string()))?;
        extractor
            .extract(&renderer, recognizer)
            .map_err(|e| (FailureKind::Render, e.to_string()))
    }));

    match outcome {
        Ok(Ok(result)) => RenameRecord::from_result(document, &result),
        Ok(Err((kind, message))) => {
            warn!("Failed to process {}: {} error: {}", document.relative, kind, message);
            RenameRecord::failed(document, kind, message)
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            warn!("Task for {} panicked: {}", document.relative, message);
            RenameRecord::failed(document, FailureKind::Panic, message)
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedBackend;
    use pretty_assertions::assert_eq;
    use std::fs;
    use std::num::NonZeroUsize;
    use std::path::Path;

    fn workers(n: usize) -> WorkerCount {
        WorkerCount::Fixed(NonZeroUsize::new(n).unwrap())
    }

    fn write_docs(root: &Path, docs: &[(&str, &str)]) -> Vec<Document> {
        docs.iter()
            .enumerate()
            .map(|(index, (name, script))| {
                let path = root.join(name);
                fs::write(&path, script).unwrap();
                Document::new(index, *name, path)
            })
            .collect()
    }

    #[test]
    fn test_run_reports_in_discovery_order() {
        let dir = tempfile::tempdir().unwrap();
        // Early documents are slow, so completion order differs from input order
        let docs = write_docs(
            dir.path(),
            &[
                ("a.pdf", "delay 60\n1 0 002025 05011601234567\n"),
                ("b.pdf", "delay 30\n"),
                ("c.pdf", "1 1 OO2O25 O5O116Ol234568\n"),
                ("d.pdf", "1 full 002025 0501 1601 2345 69\n"),
                ("e.pdf", "fail-open\n"),
            ],
        );
        let backend = ScriptedBackend::new();
        let scheduler = BatchScheduler::new(CodeExtractor::new(300, 2), workers(3)).with_chunk_size(1);

        let mut events = Vec::new();
        let mut sink = |record: &RenameRecord, event: &ProgressEvent| {
            events.push((record.original.clone(), event.completed, event.total));
        };
        let report = scheduler.run(&docs, &backend, &mut sink);

        let rows: Vec<(&str, &str, &str, &str)> = report
            .records
            .iter()
            .map(|r| (r.original.as_str(), r.new_name.as_str(), r.criterion.as_str(), r.code.as_str()))
            .collect();
        assert_eq!(
            rows,
            vec![
                ("a.pdf", "00202505011601234567.pdf", "region[0] p1 300dpi literal", "00202505011601234567"),
                ("b.pdf", "b.pdf", "not found", ""),
                ("c.pdf", "00202505011601234568.pdf", "region[1] p1 300dpi normalized", "00202505011601234568"),
                ("d.pdf", "00202505011601234569.pdf", "full p1 300dpi literal", "00202505011601234569"),
                ("e.pdf", "e.pdf", "open error: failed to parse PDF: scripted open failure", ""),
            ]
        );

        assert_eq!(events.len(), 5);
        assert_eq!(
            events.iter().map(|(_, completed, _)| *completed).collect::<Vec<_>>(),
            vec![1, 2, 3, 4, 5]
        );
        assert!(events.iter().all(|(_, _, total)| *total == 5));
        let mut seen: Vec<_> = events.iter().map(|(name, _, _)| name.clone()).collect();
        seen.sort();
        assert_eq!(seen, vec!["a.pdf", "b.pdf", "c.pdf", "d.pdf", "e.pdf"]);
    }

    #[test]
    fn test_panicking_task_is_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let docs = write_docs(
            dir.path(),
            &[
                ("boom.pdf", "panic\n1 0 00202505011601234567\n"),
                ("ok.pdf", "1 0 00202505011601234567\n"),
            ],
        );
        let backend = ScriptedBackend::new();
        let scheduler = BatchScheduler::new(CodeExtractor::new(300, 2), workers(1));

        let report = scheduler.run(&docs, &backend, &mut |_: &RenameRecord, _: &ProgressEvent| {});

        assert_eq!(report.len(), 2);
        assert!(report.records[0].criterion.starts_with("panic error:"));
        assert_eq!(report.records[0].code, "");
        assert_eq!(report.records[1].code, "00202505011601234567");
    }

    #[test]
    fn test_recognizer_failure_becomes_records() {
        let dir = tempfile::tempdir().unwrap();
        let docs = write_docs(dir.path(), &[("a.pdf", ""), ("b.pdf", ""), ("c.pdf", "")]);
        let backend = ScriptedBackend::new().with_failing_recognizer();
        let scheduler = BatchScheduler::new(CodeExtractor::new(300, 2), workers(2));

        let report = scheduler.run(&docs, &backend, &mut |_: &RenameRecord, _: &ProgressEvent| {});

        assert_eq!(report.len(), 3);
        for record in &report.records {
            assert!(record.criterion.starts_with("recognizer error:"), "{}", record.criterion);
            assert_eq!(record.new_name, record.original);
        }
    }

    #[test]
    fn test_each_document_processed_exactly_once() {
        let dir = tempfile::tempdir().unwrap();
        let names: Vec<String> = (0..23).map(|i| format!("doc{:02}.pdf", i)).collect();
        let specs: Vec<(&str, &str)> = names.iter().map(|n| (n.as_str(), "")).collect();
        let docs = write_docs(dir.path(), &specs);
        let backend = ScriptedBackend::new();
        let scheduler = BatchScheduler::new(CodeExtractor::new(72, 1), workers(4));

        let mut count = 0;
        let report = scheduler.run(&docs, &backend, &mut |_: &RenameRecord, _: &ProgressEvent| count += 1);

        assert_eq!(count, 23);
        assert_eq!(backend.opened(), 23);
        let originals: Vec<_> = report.records.iter().map(|r| r.original.clone()).collect();
        assert_eq!(originals, names);
    }

    #[test]
    fn test_empty_batch() {
        let backend = ScriptedBackend::new();
        let scheduler = BatchScheduler::new(CodeExtractor::new(300, 2), WorkerCount::Auto);
        let report = scheduler.run(&[], &backend, &mut |_: &RenameRecord, _: &ProgressEvent| {});
        assert!(report.is_empty());
        assert!(scheduler.workers() >= 1);
    }
}
