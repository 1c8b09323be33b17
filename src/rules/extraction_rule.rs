use crate::archive::ArchiveEntry;
use crate::error::{MediaError, Result};
use std::fmt;
use std::str::FromStr;

pub const UNIVERSAL_RULE: &str = "*:*.*";

/// Selection pattern over archive name, file id and extension.
///
/// `None` in any field is a wildcard.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExtractionRule {
    pub archive: Option<String>,
    pub file_id: Option<u32>,
    pub extension: Option<String>,
}

impl ExtractionRule {
    pub fn universal() -> Self {
        Self::default()
    }

    /// Parses `archive:fileid.ext`. Each part may be empty or `*`.
    pub fn parse(rule: &str) -> Result<Self> {
        let malformed = |reason: &str| {
            MediaError::config(format!(
                "Malformed extraction rule '{}': {} (expected archive:fileid.ext)",
                rule, reason
            ))
        };

        if rule.matches(':').count() != 1 {
            return Err(malformed("needs exactly one ':'"));
        }
        if rule.matches('.').count() != 1 {
            return Err(malformed("needs exactly one '.'"));
        }

        let (archive, file_part) = rule
            .split_once(':')
            .ok_or_else(|| malformed("needs exactly one ':'"))?;
        let (file_id, extension) = file_part
            .split_once('.')
            .ok_or_else(|| malformed("the '.' must follow the ':'"))?;

        let file_id = match wildcard(file_id) {
            None => None,
            Some(id) => Some(
                id.parse::<u32>()
                    .map_err(|_| malformed(&format!("file id '{}' is not a number", id)))?,
            ),
        };

        Ok(Self {
            archive: wildcard(archive).map(str::to_string),
            file_id,
            extension: wildcard(extension).map(str::to_string),
        })
    }

    pub fn matches(&self, archive: &str, file_id: u32, extension: &str) -> bool {
        if self.archive.as_deref().is_some_and(|a| a != archive) {
            return false;
        }

        if self.file_id.is_some_and(|id| id != file_id) {
            return false;
        }

        if self.extension.as_deref().is_some_and(|e| e != extension) {
            return false;
        }

        true
    }

    pub fn matches_entry(&self, entry: &ArchiveEntry) -> bool {
        self.matches(&entry.archive_name, entry.file_id, &entry.extension)
    }

    pub fn is_universal(&self) -> bool {
        self.archive.is_none() && self.file_id.is_none() && self.extension.is_none()
    }
}

fn wildcard(part: &str) -> Option<&str> {
    match part {
        "" | "*" => None,
        value => Some(value),
    }
}

impl FromStr for ExtractionRule {
    type Err = MediaError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for ExtractionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let file_id = self
            .file_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "*".to_string());
        write!(
            f,
            "{}:{}.{}",
            self.archive.as_deref().unwrap_or("*"),
            file_id,
            self.extension.as_deref().unwrap_or("*")
        )
    }
}

/// Ordered rules combined with OR. An empty set selects everything.
#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: Vec<ExtractionRule>,
}

impl RuleSet {
    pub fn new(rules: Vec<ExtractionRule>) -> Self {
        if rules.is_empty() {
            return Self::select_all();
        }
        Self { rules }
    }

    pub fn select_all() -> Self {
        Self {
            rules: vec![ExtractionRule::universal()],
        }
    }

    pub fn parse_all<S: AsRef<str>>(rules: &[S]) -> Result<Self> {
        let parsed = rules
            .iter()
            .map(|r| ExtractionRule::parse(r.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(parsed))
    }

    pub fn any_matches(&self, entry: &ArchiveEntry) -> bool {
        self.rules.iter().any(|rule| rule.matches_entry(entry))
    }

    pub fn rules(&self) -> &[ExtractionRule] {
        &self.rules
    }

    pub fn selects_everything(&self) -> bool {
        self.rules.iter().any(ExtractionRule::is_universal)
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::select_all()
    }
}
