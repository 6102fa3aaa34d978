//! Models command - check the OCR engine setup.

use std::path::PathBuf;

use clap::{Args, Subcommand};
use console::style;

use ocren_core::ocr::{recognizer_from_config, MODEL_FILES};
use ocren_core::models::OcrConfig;
use ocren_core::OcrEngineKind;

use super::config::load_config;

/// Arguments for the models command.
#[derive(Args)]
pub struct ModelsArgs {
    #[command(subcommand)]
    command: ModelsCommand,
}

#[derive(Subcommand)]
enum ModelsCommand {
    /// Check that the configured engine can be loaded
    Status(StatusArgs),

    /// Show the default model directory
    Path,
}

#[derive(Args)]
struct StatusArgs {
    /// Model directory to check instead of the configured one
    #[arg(short, long)]
    model_dir: Option<PathBuf>,

    /// Tesseract binary to check instead of the configured one
    #[arg(long)]
    tesseract: Option<PathBuf>,
}

/// Where onnx models are looked up when no directory is configured.
pub fn default_model_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ocren")
        .join("models")
}

pub async fn run(args: ModelsArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    match args.command {
        ModelsCommand::Status(status_args) => check_status(status_args, config_path),
        ModelsCommand::Path => {
            println!("{}", default_model_dir().display());
            Ok(())
        }
    }
}

fn check_status(args: StatusArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let model_dir = args
        .model_dir
        .or_else(|| config.ocr.model_dir.clone())
        .unwrap_or_else(default_model_dir);

    println!("{}", style("OCR Engine Status").bold());
    println!(
        "Configured engine: {}",
        style(format!("{:?}", config.ocr.engine).to_lowercase()).cyan().bold()
    );
    println!();

    println!("{} onnx {}", style("▸").bold(), model_dir.display());
    let mut all_present = true;
    for name in MODEL_FILES {
        let path = model_dir.join(name);
        match path.metadata() {
            Ok(meta) if meta.is_file() => {
                println!(
                    "  {} {} ({:.1} MB)",
                    style("✓").green(),
                    name,
                    meta.len() as f64 / 1_048_576.0
                );
            }
            _ => {
                all_present = false;
                println!("  {} {} {}", style("✗").red(), name, style("missing").dim());
            }
        }
    }
    if !all_present {
        println!(
            "  {}",
            style("Place det.onnx, latin_rec.onnx and latin_dict.txt in this directory.").dim()
        );
    }

    let tesseract = OcrConfig {
        engine: OcrEngineKind::Tesseract,
        tesseract_path: args.tesseract.or_else(|| config.ocr.tesseract_path.clone()),
        ..config.ocr.clone()
    };
    println!();
    match recognizer_from_config(&tesseract) {
        Ok(_) => println!("{} tesseract {}", style("▸").bold(), style("available").green()),
        Err(e) => println!("{} tesseract {} ({})", style("▸").bold(), style("unavailable").yellow(), e),
    }

    Ok(())
}
