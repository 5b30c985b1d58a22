//! # session_scan
//!
//! Batch pass over a tree of `.docx` counseling records:
//!
//! 1. [`locate`] walks the tree and drops Word lock files and screenshot
//!    bundles according to the [`rules`] table.
//! 2. [`office`] linearizes each document: body paragraphs, then table rows
//!    with cells joined by `" | "`.
//! 3. [`corpus`] routes each document into the session or medical-exam
//!    collection by filename.
//! 4. [`scanner`] optionally surfaces symptom-like entities and therapy
//!    technique keywords per document.
//!
//! A file that cannot be parsed is logged and kept as an empty, failed entry;
//! it never stops the batch. An unreadable root or an unavailable entity
//! model aborts the run.
//!
//! ```no_run
//! use session_scan::{ScanOptions, analyze_path};
//!
//! let report = analyze_path("records/".as_ref(), &ScanOptions::default())?;
//! println!("{} sessions", report.corpus.sessions().len());
//! # Ok::<(), session_scan::Error>(())
//! ```

pub mod corpus;
pub mod export;
pub mod locate;
pub mod office;
pub mod rules;
pub mod scanner;

use log::info;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub use corpus::{Corpus, DocumentSink, ExtractedDocument, Router};
pub use export::{ExportFormat, csv_safe_cell, export_report, print_failed_files, render_text};
pub use locate::{DocumentPath, Locator, collect_files};
pub use office::{Extraction, LinearText, extract_text_from_docx};
pub use rules::{Category, Disposition, Rule, RuleTable};
pub use scanner::{DocumentFinding, Finding, Gazetteer, Scanner, TechniqueMatcher, scan_corpus};

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Locate(#[from] locate::LocateError),
    #[error(transparent)]
    Scan(#[from] scanner::ScanError),
    #[error(transparent)]
    Export(#[from] export::ExportError),
}

/// Knobs for a run. `Default` matches the CLI defaults.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub rules: RuleTable,
    /// Extract documents on the rayon pool instead of one by one.
    pub parallel: bool,
    /// Run the entity/technique scanner after collection.
    pub scan: bool,
    /// Lexicon file for the entity recognizer; the built-in one otherwise.
    pub lexicon: Option<PathBuf>,
    pub entity_labels: Vec<String>,
    pub export_format: ExportFormat,
    pub out_dir: PathBuf,
    pub preview_chars: usize,
}

impl Default for ScanOptions {
    fn default() -> Self {
        ScanOptions {
            rules: RuleTable::default(),
            parallel: false,
            scan: true,
            lexicon: None,
            entity_labels: scanner::DEFAULT_ENTITY_LABELS
                .iter()
                .map(|l| l.to_string())
                .collect(),
            export_format: ExportFormat::Txt,
            out_dir: PathBuf::from("."),
            preview_chars: 100,
        }
    }
}

#[derive(Debug, Default)]
pub struct ScanReport {
    pub corpus: Corpus,
    /// `None` when scanning was disabled.
    pub findings: Option<Vec<DocumentFinding>>,
    /// `(path, reason)` for every document whose extraction failed.
    pub failed_files: Vec<(String, String)>,
    /// Export files written by this run.
    pub written: Vec<PathBuf>,
}

/// Locates, extracts and routes every document under `root`.
pub fn collect_corpus(root: &Path, options: &ScanOptions) -> Result<Corpus, Error> {
    let documents = Locator::new(root, options.rules.clone()).walk()?;
    let router = Router::new(&options.rules);
    let mut corpus = Corpus::default();

    if options.parallel {
        let paths = documents.collect::<Result<Vec<_>, _>>()?;
        let extracted: Vec<ExtractedDocument> = paths
            .into_par_iter()
            .map(ExtractedDocument::extract)
            .collect();
        for doc in extracted {
            router.route(doc, &mut corpus);
        }
    } else {
        for path in documents {
            router.route(ExtractedDocument::extract(path?), &mut corpus);
        }
    }

    info!(
        "Collected {} sessions and {} medical exams from {}",
        corpus.sessions().len(),
        corpus.medical_exams().len(),
        root.display()
    );
    Ok(corpus)
}

/// Loads the entity model and technique list. Fails when the model cannot be
/// loaded.
pub fn build_scanner(options: &ScanOptions) -> Result<Scanner, Error> {
    let gazetteer = match &options.lexicon {
        Some(path) => Gazetteer::load(path)?,
        None => Gazetteer::builtin()?,
    };
    info!("Entity lexicon loaded with {} terms", gazetteer.len());
    Ok(Scanner::new(
        Box::new(gazetteer),
        &options.entity_labels,
        TechniqueMatcher::standard()?,
    ))
}

/// Full run: scanner setup, collection, scan and export.
pub fn analyze_path(root: &Path, options: &ScanOptions) -> Result<ScanReport, Error> {
    // The model is loaded before any document is read.
    let scanner = if options.scan {
        Some(build_scanner(options)?)
    } else {
        None
    };

    let corpus = collect_corpus(root, options)?;
    let failed_files = corpus
        .failures()
        .map(|(p, e)| (p.path().display().to_string(), e.to_string()))
        .collect();
    let findings = scanner.as_ref().map(|s| scan_corpus(&corpus, s));

    let mut report = ScanReport {
        corpus,
        findings,
        failed_files,
        written: Vec::new(),
    };
    report.written = export_report(
        &report,
        options.export_format,
        &options.out_dir,
        &export_stem(root),
    )?;
    Ok(report)
}

fn export_stem(root: &Path) -> String {
    root.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.trim().replace(' ', "_"))
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| "records".to_string())
}
