//! Vocabulary tables for tokenization and query analysis.
//!
//! The stop-word list, the ordered domain taxonomy, and the question-type
//! families are data. A default set is compiled in from
//! `default_vocabulary.toml`; deployments can supply their own TOML
//! document with the same shape via [`Vocabulary::from_toml_str`].

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

const DEFAULT_VOCABULARY: &str = include_str!("default_vocabulary.toml");

#[derive(Debug, Error)]
pub enum VocabularyError {
    #[error("invalid vocabulary TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("domain '{0}' is defined more than once")]
    DuplicateDomain(String),
    #[error("domain name '{0}' is reserved for the default domain")]
    ReservedDomain(String),
    #[error("question type '{0}' is defined more than once")]
    DuplicateQuestionType(String),
    #[error("question type '{0}' has no cues")]
    EmptyCues(String),
}

/// Coarse question shape used to pick answer indicators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionType {
    Factual,
    Boolean,
    Explanatory,
    General,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::Factual => "factual",
            QuestionType::Boolean => "boolean",
            QuestionType::Explanatory => "explanatory",
            QuestionType::General => "general",
        }
    }
}

impl std::fmt::Display for QuestionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Domain {
    pub name: String,
    pub categories: Vec<Category>,
}

impl Domain {
    /// All terms of every category, in declaration order.
    pub fn terms(&self) -> impl Iterator<Item = &str> {
        self.categories
            .iter()
            .flat_map(|c| c.terms.iter().map(String::as_str))
    }

    pub fn term_count(&self) -> usize {
        self.categories.iter().map(|c| c.terms.len()).sum()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Category {
    pub name: String,
    pub terms: Vec<String>,
}

/// Cue words that identify a question type, and answer indicators that
/// suggest a passage fits that type.
#[derive(Debug, Clone, Deserialize)]
pub struct QuestionFamily {
    pub kind: QuestionType,
    pub cues: Vec<String>,
    #[serde(default)]
    pub indicators: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Vocabulary {
    #[serde(default = "default_domain_name")]
    pub default_domain: String,
    #[serde(default)]
    pub stop_words: HashSet<String>,
    #[serde(default)]
    pub domains: Vec<Domain>,
    #[serde(default)]
    pub question_types: Vec<QuestionFamily>,
}

fn default_domain_name() -> String {
    "general".to_string()
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self::from_toml_str(DEFAULT_VOCABULARY).expect("built-in vocabulary is valid")
    }
}

impl Vocabulary {
    /// Parse and validate a vocabulary document.
    pub fn from_toml_str(s: &str) -> Result<Self, VocabularyError> {
        let mut vocab: Vocabulary = toml::from_str(s)?;
        vocab.stop_words = vocab.stop_words.iter().map(|w| w.to_lowercase()).collect();
        vocab.validate()?;
        Ok(vocab)
    }

    fn validate(&self) -> Result<(), VocabularyError> {
        let mut seen = HashSet::new();
        for domain in &self.domains {
            if domain.name == self.default_domain {
                return Err(VocabularyError::ReservedDomain(domain.name.clone()));
            }
            if !seen.insert(domain.name.as_str()) {
                return Err(VocabularyError::DuplicateDomain(domain.name.clone()));
            }
        }

        let mut kinds = HashSet::new();
        for family in &self.question_types {
            if !kinds.insert(family.kind) {
                return Err(VocabularyError::DuplicateQuestionType(family.kind.to_string()));
            }
            if family.cues.is_empty() {
                return Err(VocabularyError::EmptyCues(family.kind.to_string()));
            }
        }
        Ok(())
    }

    pub fn is_stop_word(&self, token: &str) -> bool {
        self.stop_words.contains(token)
    }

    pub fn domain(&self, name: &str) -> Option<&Domain> {
        self.domains.iter().find(|d| d.name == name)
    }

    /// Answer indicators for a question type; empty for `General`.
    pub fn indicators(&self, kind: QuestionType) -> &[String] {
        self.question_types
            .iter()
            .find(|f| f.kind == kind)
            .map(|f| f.indicators.as_slice())
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_vocabulary_loads() {
        let v = Vocabulary::default();
        assert_eq!(v.default_domain, "general");
        let names: Vec<_> = v.domains.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["insurance", "legal", "hr"]);
        assert_eq!(v.domain("insurance").map(|d| d.term_count()), Some(30));
        assert!(v.is_stop_word("the"));
        assert!(!v.is_stop_word("premium"));
    }

    #[test]
    fn test_question_family_order() {
        let v = Vocabulary::default();
        let kinds: Vec<_> = v.question_types.iter().map(|f| f.kind).collect();
        assert_eq!(
            kinds,
            vec![QuestionType::Factual, QuestionType::Boolean, QuestionType::Explanatory]
        );
        assert_eq!(v.indicators(QuestionType::Boolean).len(), 6);
        assert!(v.indicators(QuestionType::General).is_empty());
    }

    #[test]
    fn test_custom_vocabulary() {
        let toml = r#"
stop_words = ["The", "of"]

[[domains]]
name = "tax"
[[domains.categories]]
name = "filing"
terms = ["deadline", "return"]

[[question_types]]
kind = "boolean"
cues = ["is"]
"#;
        let v = Vocabulary::from_toml_str(toml).unwrap();
        assert!(v.is_stop_word("the"));
        assert_eq!(v.domains[0].terms().collect::<Vec<_>>(), vec!["deadline", "return"]);
        assert!(v.indicators(QuestionType::Boolean).is_empty());
    }

    #[test]
    fn test_duplicate_domain_rejected() {
        let toml = r#"
[[domains]]
name = "legal"
categories = []
[[domains]]
name = "legal"
categories = []
"#;
        let err = Vocabulary::from_toml_str(toml).unwrap_err();
        assert!(matches!(err, VocabularyError::DuplicateDomain(_)));
    }

    #[test]
    fn test_reserved_domain_rejected() {
        let toml = r#"
[[domains]]
name = "general"
categories = []
"#;
        let err = Vocabulary::from_toml_str(toml).unwrap_err();
        assert!(matches!(err, VocabularyError::ReservedDomain(_)));
    }

    #[test]
    fn test_duplicate_question_type_rejected() {
        let toml = r#"
[[question_types]]
kind = "factual"
cues = ["what"]
[[question_types]]
kind = "factual"
cues = ["which"]
"#;
        let err = Vocabulary::from_toml_str(toml).unwrap_err();
        assert!(matches!(err, VocabularyError::DuplicateQuestionType(_)));
    }

    #[test]
    fn test_malformed_toml_rejected() {
        let err = Vocabulary::from_toml_str("domains = 3").unwrap_err();
        assert!(matches!(err, VocabularyError::Parse(_)));
    }
}
