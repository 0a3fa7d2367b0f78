//! Name-based inclusion rules.
//!
//! A rule decides whether a discovered object, identified by its full name,
//! is kept. `ExcludeAll` is special: retrievers check for it before issuing
//! any query and skip their whole family.

use crate::error::CrawlError;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Predicate over a fully qualified object name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "InclusionRuleSpec", into = "InclusionRuleSpec")]
pub enum InclusionRule {
    /// Keeps every object
    #[default]
    IncludeAll,
    /// Keeps nothing; the owning retriever does not run
    ExcludeAll,
    /// Keeps names fully matching `include` and not fully matching `exclude`
    Patterns {
        include: Regex,
        exclude: Option<Regex>,
    },
}

impl InclusionRule {
    /// Builds a pattern rule. Both patterns must match the whole name.
    ///
    /// # Errors
    /// Returns a configuration error if either pattern is not a valid regex.
    pub fn new(include: &str, exclude: Option<&str>) -> crate::Result<Self> {
        let include = compile_anchored(include)?;
        let exclude = exclude
            .filter(|pattern| !pattern.is_empty())
            .map(compile_anchored)
            .transpose()?;
        Ok(Self::Patterns { include, exclude })
    }

    /// Builds a rule that keeps everything except names matching `exclude`.
    pub fn excluding(exclude: &str) -> crate::Result<Self> {
        Self::new(".*", Some(exclude))
    }

    /// Tests a full name against the rule. Pure and side-effect free.
    pub fn include(&self, full_name: &str) -> bool {
        match self {
            Self::IncludeAll => true,
            Self::ExcludeAll => false,
            Self::Patterns { include, exclude } => {
                include.is_match(full_name)
                    && !exclude.as_ref().is_some_and(|e| e.is_match(full_name))
            }
        }
    }

    /// True when the governed family should not be queried at all
    pub fn is_exclude_all(&self) -> bool {
        matches!(self, Self::ExcludeAll)
    }
}

fn compile_anchored(pattern: &str) -> crate::Result<Regex> {
    Regex::new(&format!("^(?:{})$", pattern)).map_err(|e| {
        CrawlError::configuration(format!("Invalid inclusion pattern '{}': {}", pattern, e))
    })
}

/// Serialized form of an inclusion rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum InclusionRuleSpec {
    Keyword(String),
    Patterns {
        include: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        exclude: Option<String>,
    },
}

const INCLUDE_ALL: &str = "include-all";
const EXCLUDE_ALL: &str = "exclude-all";

impl TryFrom<InclusionRuleSpec> for InclusionRule {
    type Error = CrawlError;

    fn try_from(spec: InclusionRuleSpec) -> Result<Self, Self::Error> {
        match spec {
            InclusionRuleSpec::Keyword(keyword) => match keyword.as_str() {
                INCLUDE_ALL => Ok(Self::IncludeAll),
                EXCLUDE_ALL => Ok(Self::ExcludeAll),
                other => Err(CrawlError::configuration(format!(
                    "Unknown inclusion rule '{}', expected '{}', '{}' or an include/exclude object",
                    other, INCLUDE_ALL, EXCLUDE_ALL
                ))),
            },
            InclusionRuleSpec::Patterns { include, exclude } => {
                Self::new(&include, exclude.as_deref())
            }
        }
    }
}

impl From<InclusionRule> for InclusionRuleSpec {
    fn from(rule: InclusionRule) -> Self {
        match rule {
            InclusionRule::IncludeAll => Self::Keyword(INCLUDE_ALL.to_string()),
            InclusionRule::ExcludeAll => Self::Keyword(EXCLUDE_ALL.to_string()),
            InclusionRule::Patterns { include, exclude } => Self::Patterns {
                include: strip_anchors(include.as_str()),
                exclude: exclude.map(|e| strip_anchors(e.as_str())),
            },
        }
    }
}

fn strip_anchors(pattern: &str) -> String {
    pattern
        .strip_prefix("^(?:")
        .and_then(|p| p.strip_suffix(")$"))
        .unwrap_or(pattern)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_special_rules() {
        assert!(InclusionRule::IncludeAll.include("PUBLIC.INVOICE"));
        assert!(!InclusionRule::ExcludeAll.include("PUBLIC.INVOICE"));
        assert!(InclusionRule::ExcludeAll.is_exclude_all());
        assert!(!InclusionRule::default().is_exclude_all());
    }

    #[test]
    fn test_patterns_are_full_matches() {
        let rule = InclusionRule::new("PUBLIC\\..*", Some(".*\\.TEMP_.*")).unwrap();

        assert!(rule.include("PUBLIC.INVOICE"));
        assert!(!rule.include("PUBLIC.TEMP_ORDERS"));
        assert!(!rule.include("OTHER.PUBLIC.INVOICE"));
        assert!(!rule.include("SALES.INVOICE"));
    }

    #[test]
    fn test_alternation_is_anchored_as_a_whole() {
        let rule = InclusionRule::new("A|B", None).unwrap();
        assert!(rule.include("A"));
        assert!(rule.include("B"));
        assert!(!rule.include("AB"));
    }

    #[test]
    fn test_invalid_pattern() {
        let result = InclusionRule::new("(unclosed", None);
        assert!(matches!(result, Err(CrawlError::Configuration { .. })));
    }

    #[test]
    fn test_serde_forms() {
        let rule: InclusionRule = serde_json::from_str("\"exclude-all\"").unwrap();
        assert!(rule.is_exclude_all());

        let rule: InclusionRule =
            serde_json::from_str(r#"{"include": "PUBLIC\\..*", "exclude": ".*_OLD"}"#).unwrap();
        assert!(rule.include("PUBLIC.ITEM"));
        assert!(!rule.include("PUBLIC.ITEM_OLD"));

        let json = serde_json::to_value(&rule).unwrap();
        assert_eq!(json["include"], "PUBLIC\\..*");
        assert_eq!(json["exclude"], ".*_OLD");

        assert!(serde_json::from_str::<InclusionRule>("\"everything\"").is_err());
    }
}
