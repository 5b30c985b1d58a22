//! Heuristic surfacing of symptom mentions and therapy techniques.
//!
//! Entity recognition is a pluggable capability ([`EntityRecognizer`]); the
//! crate ships a lexicon-driven recognizer ([`Gazetteer`]). Technique
//! detection is a fixed keyword list matched case-insensitively. Neither is
//! diagnostic output.

use log::{info, warn};
use regex::{Regex, RegexBuilder};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::corpus::Corpus;
use crate::locate::DocumentPath;
use crate::rules::Category;

pub const THERAPY_TECHNIQUES: &[&str] = &[
    "cognitivo conductual",
    "psicoeducación",
    "terapia familiar",
    "introspección",
];

pub const DEFAULT_ENTITY_LABELS: &[&str] = &["SYMPTOM", "DISEASE", "EMOTION"];

/// Lexicon used when no `--lexicon` file is given.
/// One `term<TAB>LABEL` entry per line.
pub const BUILTIN_LEXICON: &str = "\
# Spanish clinical vocabulary
ansiedad\tSYMPTOM
ataque de pánico\tSYMPTOM
ataques de pánico\tSYMPTOM
insomnio\tSYMPTOM
fatiga\tSYMPTOM
cansancio\tSYMPTOM
cefalea\tSYMPTOM
dolor de cabeza\tSYMPTOM
irritabilidad\tSYMPTOM
apatía\tSYMPTOM
anhedonia\tSYMPTOM
llanto\tSYMPTOM
pesadillas\tSYMPTOM
taquicardia\tSYMPTOM
mareos\tSYMPTOM
ideación suicida\tSYMPTOM
depresión\tDISEASE
trastorno de ansiedad\tDISEASE
trastorno bipolar\tDISEASE
estrés postraumático\tDISEASE
TDAH\tDISEASE
hipertensión\tDISEASE
diabetes\tDISEASE
hipotiroidismo\tDISEASE
tristeza\tEMOTION
miedo\tEMOTION
angustia\tEMOTION
culpa\tEMOTION
ira\tEMOTION
enojo\tEMOTION
frustración\tEMOTION
soledad\tEMOTION
vergüenza\tEMOTION
sertralina\tMEDICATION
fluoxetina\tMEDICATION
clonazepam\tMEDICATION
";

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("entity model unavailable at {}: {source}", .path.display())]
    ModelUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid lexicon entry at {origin}:{line}: {reason}")]
    Lexicon {
        origin: String,
        line: usize,
        reason: String,
    },
    #[error("entity model {0} has no entries")]
    EmptyModel(String),
    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entity {
    pub text: String,
    pub label: String,
}

/// Text in, labeled entities out, in the order they occur.
pub trait EntityRecognizer: Send + Sync {
    fn entities(&self, text: &str) -> Vec<Entity>;

    fn supported_labels(&self) -> BTreeSet<String>;
}

/// Whole-word, case-insensitive lexicon matcher. Longer terms win over
/// shorter ones starting at the same position.
#[derive(Debug)]
pub struct Gazetteer {
    pattern: Regex,
    labels: HashMap<String, String>,
}

impl Gazetteer {
    pub fn builtin() -> Result<Self, ScanError> {
        Gazetteer::parse(BUILTIN_LEXICON, "builtin")
    }

    pub fn load(path: &Path) -> Result<Self, ScanError> {
        let content = fs::read_to_string(path).map_err(|source| ScanError::ModelUnavailable {
            path: path.to_path_buf(),
            source,
        })?;
        Gazetteer::parse(&content, &path.display().to_string())
    }

    /// Parses `term<TAB>LABEL` lines. Blank lines and `#` comments are
    /// ignored; a later entry for the same term replaces the earlier one.
    pub fn parse(content: &str, origin: &str) -> Result<Self, ScanError> {
        let mut labels = HashMap::new();
        for (idx, raw) in content.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let lexicon_error = |reason: &str| ScanError::Lexicon {
                origin: origin.to_string(),
                line: idx + 1,
                reason: reason.to_string(),
            };
            let (term, label) = line
                .split_once('\t')
                .ok_or_else(|| lexicon_error("expected term<TAB>LABEL"))?;
            let (term, label) = (term.trim(), label.trim());
            if term.is_empty() || label.is_empty() {
                return Err(lexicon_error("empty term or label"));
            }
            labels.insert(term.to_lowercase(), label.to_string());
        }
        if labels.is_empty() {
            return Err(ScanError::EmptyModel(origin.to_string()));
        }

        let mut terms: Vec<&String> = labels.keys().collect();
        terms.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()).then(a.cmp(b)));
        let alternation = terms
            .iter()
            .map(|t| regex::escape(t))
            .collect::<Vec<_>>()
            .join("|");
        let pattern = RegexBuilder::new(&format!(r"\b(?:{alternation})\b"))
            .case_insensitive(true)
            .build()?;

        Ok(Gazetteer { pattern, labels })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

impl EntityRecognizer for Gazetteer {
    fn entities(&self, text: &str) -> Vec<Entity> {
        self.pattern
            .find_iter(text)
            .filter_map(|m| {
                self.labels
                    .get(&m.as_str().to_lowercase())
                    .map(|label| Entity {
                        text: m.as_str().to_string(),
                        label: label.clone(),
                    })
            })
            .collect()
    }

    fn supported_labels(&self) -> BTreeSet<String> {
        self.labels.values().cloned().collect()
    }
}

/// Case-insensitive keyword matcher; reports every occurrence as written in
/// the text.
#[derive(Debug, Clone)]
pub struct TechniqueMatcher {
    pattern: Regex,
}

impl TechniqueMatcher {
    pub fn new(keywords: &[&str]) -> Result<Self, ScanError> {
        let alternation = keywords
            .iter()
            .map(|k| regex::escape(k))
            .collect::<Vec<_>>()
            .join("|");
        let pattern = RegexBuilder::new(&format!("({alternation})"))
            .case_insensitive(true)
            .build()?;
        Ok(TechniqueMatcher { pattern })
    }

    pub fn standard() -> Result<Self, ScanError> {
        TechniqueMatcher::new(THERAPY_TECHNIQUES)
    }

    pub fn find_all(&self, text: &str) -> Vec<String> {
        self.pattern
            .find_iter(text)
            .map(|m| m.as_str().to_string())
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub entities: Vec<String>,
    pub techniques: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentFinding {
    pub category: Category,
    pub source: DocumentPath,
    pub finding: Finding,
}

pub struct Scanner {
    recognizer: Box<dyn EntityRecognizer>,
    allowed: Vec<String>,
    techniques: TechniqueMatcher,
}

impl Scanner {
    /// Builds a scanner keeping only entities labeled with one of
    /// `allowed`. Labels the recognizer never produces are reported once.
    pub fn new(
        recognizer: Box<dyn EntityRecognizer>,
        allowed: &[String],
        techniques: TechniqueMatcher,
    ) -> Self {
        let supported = recognizer.supported_labels();
        for label in allowed.iter().filter(|l| !supported.contains(*l)) {
            warn!("Entity label {label} is not produced by the recognizer; nothing will carry it");
        }
        Scanner {
            recognizer,
            allowed: allowed.to_vec(),
            techniques,
        }
    }

    pub fn scan(&self, text: &str) -> Finding {
        let entities = self
            .recognizer
            .entities(text)
            .into_iter()
            .filter(|e| self.allowed.iter().any(|l| *l == e.label))
            .map(|e| e.text)
            .collect();
        Finding {
            entities,
            techniques: self.techniques.find_all(text),
        }
    }
}

/// Scans every document text, sessions first, then medical exams.
pub fn scan_corpus(corpus: &Corpus, scanner: &Scanner) -> Vec<DocumentFinding> {
    let findings: Vec<DocumentFinding> = corpus
        .iter()
        .map(|(category, doc)| DocumentFinding {
            category,
            source: doc.source.clone(),
            finding: scanner.scan(&doc.text()),
        })
        .collect();
    info!("Scanned {} documents", findings.len());
    findings
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn builtin_scanner() -> Scanner {
        Scanner::new(
            Box::new(Gazetteer::builtin().unwrap()),
            &labels(DEFAULT_ENTITY_LABELS),
            TechniqueMatcher::standard().unwrap(),
        )
    }

    #[test]
    fn technique_match_is_case_insensitive() {
        let matcher = TechniqueMatcher::standard().unwrap();
        let found = matcher.find_all("Terapia Cognitivo Conductual intensiva");
        assert_eq!(found.len(), 1);
        assert!(found[0].eq_ignore_ascii_case("cognitivo conductual"));
    }

    #[test]
    fn technique_repeats_are_kept() {
        let matcher = TechniqueMatcher::standard().unwrap();
        let found = matcher.find_all(
            "PSICOEDUCACIÓN al inicio; terapia familiar y luego psicoeducación otra vez",
        );
        assert_eq!(
            found,
            vec!["PSICOEDUCACIÓN", "terapia familiar", "psicoeducación"]
        );
    }

    #[test]
    fn entities_outside_allow_list_are_dropped() {
        let finding = builtin_scanner().scan("Refiere insomnio y toma sertralina por la ansiedad.");
        assert_eq!(finding.entities, vec!["insomnio", "ansiedad"]);
    }

    #[test]
    fn duplicate_entities_are_kept_in_order() {
        let finding = builtin_scanner().scan("Tristeza. Ansiedad por la mañana, tristeza por la noche.");
        assert_eq!(finding.entities, vec!["Tristeza", "Ansiedad", "tristeza"]);
    }

    #[test]
    fn longest_term_wins_and_words_are_whole() {
        let gazetteer = Gazetteer::builtin().unwrap();
        let found = gazetteer.entities("Diagnóstico: trastorno de ansiedad. Mira el iris.");
        assert_eq!(
            found,
            vec![Entity {
                text: "trastorno de ansiedad".to_string(),
                label: "DISEASE".to_string()
            }]
        );
    }

    #[test]
    fn lexicon_without_tab_is_rejected() {
        let err = Gazetteer::parse("# header\nansiedad SYMPTOM\n", "inline").unwrap_err();
        match err {
            ScanError::Lexicon { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn empty_lexicon_is_rejected() {
        assert!(matches!(
            Gazetteer::parse("\n# only comments\n", "inline"),
            Err(ScanError::EmptyModel(_))
        ));
    }

    #[test]
    fn missing_lexicon_file_is_model_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let err = Gazetteer::load(&dir.path().join("missing.tsv")).unwrap_err();
        assert!(matches!(err, ScanError::ModelUnavailable { .. }));
    }

    #[test]
    fn custom_labels_filter_custom_model() {
        let gazetteer = Gazetteer::parse("miedo\tFEAR\nsueño\tSLEEP\n", "inline").unwrap();
        assert_eq!(gazetteer.len(), 2);
        let scanner = Scanner::new(
            Box::new(gazetteer),
            &labels(&["SLEEP"]),
            TechniqueMatcher::standard().unwrap(),
        );
        let finding = scanner.scan("Miedo y falta de sueño; sueño ligero.");
        assert_eq!(finding.entities, vec!["sueño", "sueño"]);
        assert!(finding.techniques.is_empty());
    }
}
