#![forbid(unsafe_code)]
//! # session_scan CLI
//!
//! Command-line front end for the `session_scan` crate. Point it at a folder
//! of `.docx` counseling records; it prints every session and medical-exam
//! record, followed by the symptom and therapy-technique mentions found in
//! each.
//!
//! ## Features
//! - Session / medical-exam routing by filename (`EM*` files are exams).
//! - Word lock files (`~$*`) and `Capturas*` files are skipped.
//! - Entity scanning with the built-in Spanish lexicon or a custom one.
//! - Optional CSV/TSV/JSON export of documents and findings.
//!
//! ## Example
//! ```bash
//! RUST_LOG=info cargo run --release -- "Miriam /" --export-format json --out-dir reports
//! ```
//!
//! See `--help` for all available options.

use clap::Parser;
use log::error;
use std::path::PathBuf;
use std::process;

use session_scan::{ExportFormat, ScanOptions, analyze_path, print_failed_files, render_text};

#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// Root directory holding the .docx records
    path: PathBuf,

    /// Output format for export (txt, csv, tsv, json)
    #[arg(long, default_value = "txt")]
    export_format: ExportFormat,

    /// Directory export files are written to
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,

    /// Entity lexicon (one `term<TAB>LABEL` per line); built-in Spanish lexicon if omitted
    #[arg(long)]
    lexicon: Option<PathBuf>,

    /// Entity label to keep (repeatable; default: SYMPTOM, DISEASE, EMOTION)
    #[arg(long = "label")]
    labels: Vec<String>,

    /// Skip entity and technique scanning
    #[arg(long, default_value_t = false)]
    no_scan: bool,

    /// Extract documents in parallel
    #[arg(long, default_value_t = false)]
    parallel: bool,

    /// Characters of each record shown in the analysis section
    #[arg(long, default_value_t = 100)]
    preview: usize,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let mut options = ScanOptions {
        parallel: cli.parallel,
        scan: !cli.no_scan,
        lexicon: cli.lexicon,
        export_format: cli.export_format,
        out_dir: cli.out_dir,
        preview_chars: cli.preview,
        ..ScanOptions::default()
    };
    if !cli.labels.is_empty() {
        options.entity_labels = cli.labels;
    }

    match analyze_path(&cli.path, &options) {
        Ok(report) => {
            println!("{}", render_text(&report, options.preview_chars));
            for path in &report.written {
                println!("Wrote {}", path.display());
            }
            if !report.failed_files.is_empty() {
                print_failed_files(&report.failed_files);
            }
        }
        Err(e) => {
            error!("Error: {}", e);
            process::exit(1);
        }
    }
}
