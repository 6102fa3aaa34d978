//! Run command - rename a batch of documents and package the result.

use std::path::PathBuf;

use clap::{Args, ValueEnum};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;

use ocren_core::batch::ProgressEvent;
use ocren_core::{
    run_batch, BatchRequest, DpiPreset, NativeBackend, OcrEngineKind, OcrenConfig, RenameRecord,
    WorkerCount,
};

use super::config::load_config;
use super::models::default_model_dir;

/// Arguments for the run command.
#[derive(Args)]
pub struct RunArgs {
    /// Input directory or .zip archive of PDF documents
    #[arg(short, long)]
    input: PathBuf,

    /// Output archive path (the audit CSV is written next to it)
    #[arg(short, long)]
    output: PathBuf,

    /// Render resolution in dots per inch
    #[arg(long, conflicts_with = "preset")]
    dpi: Option<u32>,

    /// Named render resolution
    #[arg(long, value_enum)]
    preset: Option<Preset>,

    /// Number of leading pages to scan
    #[arg(short, long)]
    pages: Option<usize>,

    /// Number of parallel workers ("auto" or a positive integer)
    #[arg(short = 'j', long)]
    jobs: Option<WorkerCount>,

    /// Documents handed to a worker at a time
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Recognition engine
    #[arg(short, long, value_enum)]
    engine: Option<Engine>,

    /// Directory with det.onnx, latin_rec.onnx and latin_dict.txt
    #[arg(short, long)]
    model_dir: Option<PathBuf>,

    /// Path to the tesseract binary
    #[arg(long)]
    tesseract: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Preset {
    /// 150 dpi
    Low,
    /// 300 dpi
    Medium,
    /// 600 dpi
    High,
}

impl From<Preset> for DpiPreset {
    fn from(preset: Preset) -> Self {
        match preset {
            Preset::Low => DpiPreset::Low,
            Preset::Medium => DpiPreset::Medium,
            Preset::High => DpiPreset::High,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Engine {
    /// pure-onnx-ocr with local model files
    Onnx,
    /// Installed tesseract binary
    Tesseract,
}

impl From<Engine> for OcrEngineKind {
    fn from(engine: Engine) -> Self {
        match engine {
            Engine::Onnx => OcrEngineKind::Onnx,
            Engine::Tesseract => OcrEngineKind::Tesseract,
        }
    }
}

impl RunArgs {
    /// Command-line flags override the configuration file.
    fn apply(&self, config: &mut OcrenConfig) {
        if let Some(preset) = self.preset {
            config.render.dpi = DpiPreset::from(preset).dpi();
        }
        if let Some(dpi) = self.dpi {
            config.render.dpi = dpi;
        }
        if let Some(pages) = self.pages {
            config.render.pages = pages;
        }
        if let Some(jobs) = self.jobs {
            config.batch.workers = jobs;
        }
        if let Some(chunk_size) = self.chunk_size {
            config.batch.chunk_size = chunk_size;
        }
        if let Some(engine) = self.engine {
            config.ocr.engine = engine.into();
        }
        if let Some(ref model_dir) = self.model_dir {
            config.ocr.model_dir = Some(model_dir.clone());
        }
        if let Some(ref tesseract) = self.tesseract {
            config.ocr.tesseract_path = Some(tesseract.clone());
        }
        if config.ocr.engine == OcrEngineKind::Onnx && config.ocr.model_dir.is_none() {
            config.ocr.model_dir = Some(default_model_dir());
        }
    }
}

pub async fn run(args: RunArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let mut config = load_config(config_path)?;
    args.apply(&mut config);
    debug!("Effective configuration: {:?}", config);

    let backend = NativeBackend::new(config.ocr.clone());
    let request = BatchRequest {
        input: args.input,
        archive: args.output,
        config,
    };

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("=>-"),
    );

    let bar = pb.clone();
    let summary = tokio::task::spawn_blocking(move || {
        let mut sink = |record: &RenameRecord, event: &ProgressEvent| {
            bar.set_length(event.total as u64);
            bar.set_position(event.completed as u64);
            bar.set_message(format!("{} (eta {:.0?})", record.original, event.remaining));
        };
        run_batch(&request, &backend, &mut sink)
    })
    .await??;

    pb.finish_and_clear();

    let found = summary.report.found();
    let missed: Vec<_> = summary
        .report
        .records
        .iter()
        .filter(|r| r.code.is_empty())
        .collect();

    println!(
        "{} Processed {} documents in {:.1?}",
        style("✓").green(),
        summary.report.len(),
        summary.elapsed
    );
    println!(
        "   {} renamed, {} kept their name, {} collisions",
        style(found).green(),
        style(missed.len()).yellow(),
        style(summary.collisions()).red()
    );
    println!("   Archive: {}", summary.archive.display());
    println!("   Audit:   {}", summary.audit.display());

    if !missed.is_empty() {
        println!();
        println!("{}", style("Not renamed:").yellow());
        for record in missed {
            println!("  - {}: {}", record.original, record.criterion);
        }
    }

    Ok(())
}
