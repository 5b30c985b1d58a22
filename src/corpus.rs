//! Routing of extracted documents into the session and medical-exam
//! collections.

use log::debug;

use crate::locate::DocumentPath;
use crate::office::{self, ExtractError, Extraction};
use crate::rules::{Category, RuleTable};

/// A located file together with the outcome of extracting it.
#[derive(Debug)]
pub struct ExtractedDocument {
    pub source: DocumentPath,
    pub extraction: Extraction,
}

impl ExtractedDocument {
    pub fn extract(source: DocumentPath) -> Self {
        let extraction = office::extract(source.path());
        ExtractedDocument { source, extraction }
    }

    pub fn text(&self) -> String {
        self.extraction.text()
    }

    /// `"<label> in <path>:\n<text>\n"`
    pub fn record(&self, category: Category) -> String {
        format!(
            "{} in {}:\n{}\n",
            category.label(),
            self.source.path().display(),
            self.text()
        )
    }
}

/// Receives every routed document, in the order it was routed.
pub trait DocumentSink {
    fn accept(&mut self, category: Category, document: ExtractedDocument);
}

/// The two append-only collections.
#[derive(Debug, Default)]
pub struct Corpus {
    sessions: Vec<ExtractedDocument>,
    medical_exams: Vec<ExtractedDocument>,
}

impl DocumentSink for Corpus {
    fn accept(&mut self, category: Category, document: ExtractedDocument) {
        match category {
            Category::Session => self.sessions.push(document),
            Category::MedicalExam => self.medical_exams.push(document),
        }
    }
}

impl Corpus {
    pub fn sessions(&self) -> &[ExtractedDocument] {
        &self.sessions
    }

    pub fn medical_exams(&self) -> &[ExtractedDocument] {
        &self.medical_exams
    }

    pub fn collection(&self, category: Category) -> &[ExtractedDocument] {
        match category {
            Category::Session => &self.sessions,
            Category::MedicalExam => &self.medical_exams,
        }
    }

    pub fn records(&self, category: Category) -> Vec<String> {
        self.collection(category)
            .iter()
            .map(|d| d.record(category))
            .collect()
    }

    /// Both collections, sessions first, each entry tagged with its category.
    pub fn iter(&self) -> impl Iterator<Item = (Category, &ExtractedDocument)> {
        self.sessions
            .iter()
            .map(|d| (Category::Session, d))
            .chain(self.medical_exams.iter().map(|d| (Category::MedicalExam, d)))
    }

    pub fn failures(&self) -> impl Iterator<Item = (&DocumentPath, &ExtractError)> {
        self.iter()
            .filter_map(|(_, d)| d.extraction.error().map(|e| (&d.source, e)))
    }

    pub fn len(&self) -> usize {
        self.sessions.len() + self.medical_exams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub struct Router<'a> {
    rules: &'a RuleTable,
}

impl<'a> Router<'a> {
    pub fn new(rules: &'a RuleTable) -> Self {
        Router { rules }
    }

    pub fn route(&self, document: ExtractedDocument, sink: &mut impl DocumentSink) -> Category {
        let category = self.rules.category(document.source.file_name());
        debug!(
            "{} -> {}",
            document.source.path().display(),
            category.label()
        );
        sink.accept(category, document);
        category
    }
}
