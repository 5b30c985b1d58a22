use chrono::Local;
use clap::ValueEnum;
use serde::Serialize;
use std::fmt::Write as _;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::ScanReport;
use crate::corpus::Corpus;
use crate::rules::Category;
use crate::scanner::DocumentFinding;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ExportFormat {
    /// Console report only
    #[default]
    Txt,
    Csv,
    Tsv,
    Json,
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("write {} failed: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("CSV export failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON export failed: {0}")]
    Json(#[from] serde_json::Error),
}

const DOCUMENT_HEADER: [&str; 5] = ["category", "path", "file_name", "lines", "error"];
const FINDING_HEADER: [&str; 5] = ["category", "path", "file_name", "entities", "techniques"];

#[derive(Debug, Serialize)]
struct DocumentRow {
    category: Category,
    path: String,
    file_name: String,
    lines: usize,
    error: Option<String>,
}

impl DocumentRow {
    fn cells(&self) -> [String; 5] {
        [
            category_key(self.category).to_string(),
            csv_safe_cell(&self.path),
            csv_safe_cell(&self.file_name),
            self.lines.to_string(),
            csv_safe_cell(self.error.as_deref().unwrap_or("")),
        ]
    }
}

#[derive(Debug, Serialize)]
struct FindingRow<'a> {
    category: Category,
    path: String,
    file_name: &'a str,
    entities: &'a [String],
    techniques: &'a [String],
}

impl FindingRow<'_> {
    fn cells(&self) -> [String; 5] {
        [
            category_key(self.category).to_string(),
            csv_safe_cell(&self.path),
            csv_safe_cell(self.file_name),
            csv_safe_cell(&self.entities.join("; ")),
            csv_safe_cell(&self.techniques.join("; ")),
        ]
    }
}

fn category_key(category: Category) -> &'static str {
    match category {
        Category::Session => "session",
        Category::MedicalExam => "medical_exam",
    }
}

/// Neutralizes cells a spreadsheet would evaluate as a formula.
pub fn csv_safe_cell(value: &str) -> String {
    match value.chars().next() {
        Some('=' | '+' | '-' | '@' | '\t' | '\r') => format!("'{value}"),
        _ => value.to_string(),
    }
}

fn document_rows(corpus: &Corpus) -> Vec<DocumentRow> {
    corpus
        .iter()
        .map(|(category, doc)| DocumentRow {
            category,
            path: doc.source.path().display().to_string(),
            file_name: doc.source.file_name().to_string(),
            lines: doc.extraction.lines().len(),
            error: doc.extraction.error().map(|e| e.to_string()),
        })
        .collect()
}

fn finding_rows(findings: &[DocumentFinding]) -> Vec<FindingRow<'_>> {
    findings
        .iter()
        .map(|f| FindingRow {
            category: f.category,
            path: f.source.path().display().to_string(),
            file_name: f.source.file_name(),
            entities: &f.finding.entities,
            techniques: &f.finding.techniques,
        })
        .collect()
}

/// Writes `<stem>_<timestamp>_documents.<ext>` and, when the corpus was
/// scanned, `<stem>_<timestamp>_findings.<ext>` into `out_dir`. Returns the
/// written paths; `Txt` writes nothing.
pub fn export_report(
    report: &ScanReport,
    format: ExportFormat,
    out_dir: &Path,
    stem: &str,
) -> Result<Vec<PathBuf>, ExportError> {
    let (ext, delimiter) = match format {
        ExportFormat::Txt => return Ok(Vec::new()),
        ExportFormat::Csv => ("csv", b','),
        ExportFormat::Tsv => ("tsv", b'\t'),
        ExportFormat::Json => ("json", b','),
    };
    let stamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
    let mut written = Vec::new();

    let documents = document_rows(&report.corpus);
    let path = out_dir.join(format!("{stem}_{stamp}_documents.{ext}"));
    if format == ExportFormat::Json {
        write_json(&path, &documents)?;
    } else {
        write_table(&path, delimiter, &DOCUMENT_HEADER, documents.iter().map(DocumentRow::cells))?;
    }
    written.push(path);

    if let Some(findings) = &report.findings {
        let rows = finding_rows(findings);
        let path = out_dir.join(format!("{stem}_{stamp}_findings.{ext}"));
        if format == ExportFormat::Json {
            write_json(&path, &rows)?;
        } else {
            write_table(&path, delimiter, &FINDING_HEADER, rows.iter().map(FindingRow::cells))?;
        }
        written.push(path);
    }

    Ok(written)
}

fn write_json<T: Serialize>(path: &Path, rows: &T) -> Result<(), ExportError> {
    let io_err = |source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    };
    let file = File::create(path).map_err(io_err)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, rows)?;
    writer.flush().map_err(io_err)
}

fn write_table<I>(path: &Path, delimiter: u8, header: &[&str], rows: I) -> Result<(), ExportError>
where
    I: Iterator<Item = [String; 5]>,
{
    let mut wtr = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_path(path)?;
    wtr.write_record(header)?;
    for row in rows {
        wtr.write_record(&row)?;
    }
    wtr.flush().map_err(|source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Console report: every record, sessions first, then the per-document
/// findings with a short preview of each record.
pub fn render_text(report: &ScanReport, preview_chars: usize) -> String {
    let corpus = &report.corpus;
    let mut out = String::new();

    let _ = writeln!(out, "Contents of all sessions:\n");
    for record in corpus.records(Category::Session) {
        let _ = writeln!(out, "{record}");
    }
    let _ = writeln!(out, "\nContents of all medical exams:\n");
    for record in corpus.records(Category::MedicalExam) {
        let _ = writeln!(out, "{record}");
    }

    let Some(findings) = &report.findings else {
        return out;
    };
    for section in [Category::Session, Category::MedicalExam] {
        let heading = match section {
            Category::Session => "Session analysis",
            Category::MedicalExam => "Medical exam analysis",
        };
        let _ = writeln!(out, "\n{heading}:\n");
        for (finding, (category, doc)) in findings.iter().zip(corpus.iter()) {
            if category != section {
                continue;
            }
            let preview: String = doc.record(category).chars().take(preview_chars).collect();
            let _ = writeln!(
                out,
                "Processing {}:\n{preview}...",
                category.label().to_lowercase()
            );
            let _ = writeln!(out, "Entities found: {:?}", finding.finding.entities);
            let _ = writeln!(out, "Techniques found: {:?}\n", finding.finding.techniques);
        }
    }
    out
}

/// Lists files whose extraction failed on stderr.
pub fn print_failed_files(failed: &[(String, String)]) {
    eprintln!("\n{} file(s) could not be extracted:", failed.len());
    for (path, reason) in failed {
        eprintln!("  {path}: {reason}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formula_cells_are_neutralized() {
        assert_eq!(csv_safe_cell("=SUM(A1:A3)"), "'=SUM(A1:A3)");
        assert_eq!(csv_safe_cell("-5"), "'-5");
        assert_eq!(csv_safe_cell("@cmd"), "'@cmd");
        assert_eq!(csv_safe_cell("ansiedad"), "ansiedad");
        assert_eq!(csv_safe_cell(""), "");
    }

    #[test]
    fn analysis_headings_always_present_when_scanned() {
        let report = ScanReport {
            findings: Some(Vec::new()),
            ..ScanReport::default()
        };
        let text = render_text(&report, 100);
        let sessions = text.find("Session analysis:").expect("session heading");
        let exams = text.find("Medical exam analysis:").expect("exam heading");
        assert!(sessions < exams);

        let unscanned = render_text(&ScanReport::default(), 100);
        assert!(!unscanned.contains("analysis:"));
    }

    #[test]
    fn txt_format_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let report = ScanReport::default();
        let written = export_report(&report, ExportFormat::Txt, dir.path(), "x").unwrap();
        assert!(written.is_empty());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
