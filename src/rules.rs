//! Filename classification rules.
//!
//! Every located file is judged by its base filename alone. The rules live in
//! an ordered table so the skip/route decisions can be listed and tested
//! without touching the filesystem.

use serde::Serialize;

/// Prefix Word gives to the lock file it keeps next to an open document.
pub const TEMP_FILE_MARKER: &str = "~$";
/// Screenshot bundles stored alongside the session notes.
pub const EXCLUDED_PREFIX: &str = "Capturas";
/// Medical-exam documents are named `EM...`.
pub const MEDICAL_EXAM_PREFIX: &str = "EM";
/// The only document format the locator picks up.
pub const DOCX_EXTENSION: &str = ".docx";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Session,
    MedicalExam,
}

impl Category {
    /// Label used in the `"<label> in <path>:"` record header.
    pub fn label(self) -> &'static str {
        match self {
            Category::Session => "Session",
            Category::MedicalExam => "Medical exam",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Skip,
    Route(Category),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameMatch {
    Prefix(String),
    Any,
}

impl NameMatch {
    pub fn matches(&self, file_name: &str) -> bool {
        match self {
            NameMatch::Prefix(prefix) => file_name.starts_with(prefix.as_str()),
            NameMatch::Any => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub name: String,
    pub matcher: NameMatch,
    pub disposition: Disposition,
}

impl Rule {
    pub fn skip_prefix(name: &str, prefix: &str) -> Self {
        Rule {
            name: name.to_string(),
            matcher: NameMatch::Prefix(prefix.to_string()),
            disposition: Disposition::Skip,
        }
    }

    pub fn route_prefix(name: &str, prefix: &str, category: Category) -> Self {
        Rule {
            name: name.to_string(),
            matcher: NameMatch::Prefix(prefix.to_string()),
            disposition: Disposition::Route(category),
        }
    }

    pub fn route_any(name: &str, category: Category) -> Self {
        Rule {
            name: name.to_string(),
            matcher: NameMatch::Any,
            disposition: Disposition::Route(category),
        }
    }
}

/// Ordered rule list; the first matching rule decides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleTable {
    rules: Vec<Rule>,
}

impl Default for RuleTable {
    fn default() -> Self {
        RuleTable::new(vec![
            Rule::skip_prefix("temp-file", TEMP_FILE_MARKER),
            Rule::skip_prefix("screenshots", EXCLUDED_PREFIX),
            Rule::route_prefix("medical-exam", MEDICAL_EXAM_PREFIX, Category::MedicalExam),
            Rule::route_any("session", Category::Session),
        ])
    }
}

impl RuleTable {
    pub fn new(rules: Vec<Rule>) -> Self {
        RuleTable { rules }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// First matching rule wins. A name no rule claims is a session.
    pub fn evaluate(&self, file_name: &str) -> Disposition {
        self.rules
            .iter()
            .find(|r| r.matcher.matches(file_name))
            .map(|r| r.disposition)
            .unwrap_or(Disposition::Route(Category::Session))
    }

    /// Category of a file that already passed the locator. Skip rules are not
    /// consulted here, so every name lands in exactly one category.
    pub fn category(&self, file_name: &str) -> Category {
        self.rules
            .iter()
            .find_map(|r| match r.disposition {
                Disposition::Route(category) if r.matcher.matches(file_name) => Some(category),
                _ => None,
            })
            .unwrap_or(Category::Session)
    }

    /// Name of the rule that decided `file_name`, for logging.
    pub fn matching_rule(&self, file_name: &str) -> Option<&str> {
        self.rules
            .iter()
            .find(|r| r.matcher.matches(file_name))
            .map(|r| r.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_routes_and_skips() {
        let table = RuleTable::default();
        assert_eq!(
            table.evaluate("EM_report.docx"),
            Disposition::Route(Category::MedicalExam)
        );
        assert_eq!(
            table.evaluate("Session_01.docx"),
            Disposition::Route(Category::Session)
        );
        assert_eq!(table.evaluate("~$Session_01.docx"), Disposition::Skip);
        assert_eq!(table.evaluate("Capturas_2024.docx"), Disposition::Skip);
    }

    #[test]
    fn prefixes_are_case_sensitive() {
        let table = RuleTable::default();
        assert_eq!(table.category("em_report.docx"), Category::Session);
        assert_eq!(
            table.evaluate("capturas_2024.docx"),
            Disposition::Route(Category::Session)
        );
        // "EMDR" still starts with the exam marker.
        assert_eq!(table.category("EMDR_notes.docx"), Category::MedicalExam);
    }

    #[test]
    fn category_ignores_skip_rules() {
        let table = RuleTable::default();
        assert_eq!(table.category("~$EM_report.docx"), Category::Session);
        assert_eq!(table.category("Capturas.docx"), Category::Session);
    }

    #[test]
    fn empty_table_falls_back_to_session() {
        let table = RuleTable::new(Vec::new());
        assert_eq!(
            table.evaluate("anything.docx"),
            Disposition::Route(Category::Session)
        );
        assert_eq!(table.matching_rule("anything.docx"), None);
    }

    #[test]
    fn rule_order_decides() {
        let table = RuleTable::new(vec![
            Rule::route_prefix("exam-first", "EM", Category::MedicalExam),
            Rule::skip_prefix("skip-em", "EM"),
        ]);
        assert_eq!(
            table.evaluate("EM_1.docx"),
            Disposition::Route(Category::MedicalExam)
        );
        assert_eq!(table.matching_rule("EM_1.docx"), Some("exam-first"));
    }

    #[test]
    fn labels() {
        assert_eq!(Category::Session.label(), "Session");
        assert_eq!(Category::MedicalExam.label(), "Medical exam");
    }
}
