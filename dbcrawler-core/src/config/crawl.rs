//! Crawl configuration.
//!
//! This module provides `CrawlOptions`, which controls detail level,
//! inclusion rules, ordering and duplicate handling for one crawl.

use super::DetailLevel;
use crate::error::CrawlError;
use crate::inclusion::InclusionRule;
use crate::models::ObjectFamily;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Ordering applied to named collections when the catalog is finalized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortPolicy {
    /// First discovered, first listed
    #[default]
    Natural,
    /// By name, ties kept in discovery order
    Alphabetical,
}

impl std::str::FromStr for SortPolicy {
    type Err = CrawlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "natural" => Ok(Self::Natural),
            "alphabetical" | "alpha" => Ok(Self::Alphabetical),
            other => Err(CrawlError::configuration(format!(
                "Unknown sort policy '{}', expected natural or alphabetical",
                other
            ))),
        }
    }
}

/// What to do when two objects of one family share a full name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DuplicatePolicy {
    /// Abort the crawl with `CrawlError::DuplicateObject`
    Fail,
    /// Keep the first object and record a warning
    MergeAndWarn,
}

impl Default for DuplicatePolicy {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            Self::Fail
        } else {
            Self::MergeAndWarn
        }
    }
}

static INCLUDE_ALL: InclusionRule = InclusionRule::IncludeAll;

/// One inclusion rule per governed family.
///
/// Indexes, primary keys and foreign keys follow the table rule.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InclusionRules {
    pub schemas: InclusionRule,
    pub tables: InclusionRule,
    pub columns: InclusionRule,
    pub routines: InclusionRule,
    pub routine_columns: InclusionRule,
    pub sequences: InclusionRule,
    pub synonyms: InclusionRule,
}

impl InclusionRules {
    /// The rule governing a family
    pub fn rule_for(&self, family: ObjectFamily) -> &InclusionRule {
        match family {
            ObjectFamily::Schemas => &self.schemas,
            ObjectFamily::Tables
            | ObjectFamily::PrimaryKeys
            | ObjectFamily::Indexes
            | ObjectFamily::ForeignKeys => &self.tables,
            ObjectFamily::Columns => &self.columns,
            ObjectFamily::Routines => &self.routines,
            ObjectFamily::RoutineColumns => &self.routine_columns,
            ObjectFamily::Sequences => &self.sequences,
            ObjectFamily::Synonyms => &self.synonyms,
            ObjectFamily::ColumnDataTypes => &INCLUDE_ALL,
        }
    }
}

/// Configuration for a single crawl.
///
/// # Example
/// ```rust
/// use dbcrawler_core::config::{CrawlOptions, DetailLevel, SortPolicy};
///
/// let options = CrawlOptions::new()
///     .with_detail_level(DetailLevel::Maximum)
///     .with_sort_policy(SortPolicy::Alphabetical);
///
/// assert!(options.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlOptions {
    /// Which families run and at what attribute depth
    pub detail_level: DetailLevel,
    /// Per-family inclusion rules
    pub inclusion: InclusionRules,
    /// Table types passed to the table query
    pub table_types: Vec<String>,
    /// Ordering applied at finalize
    pub sort_policy: SortPolicy,
    /// Handling of full-name collisions
    pub duplicate_policy: DuplicatePolicy,
    /// Number of schemas retrieved concurrently (1-50)
    pub max_concurrent_schemas: usize,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            detail_level: DetailLevel::default(),
            inclusion: InclusionRules::default(),
            table_types: vec!["TABLE".to_string(), "VIEW".to_string()],
            sort_policy: SortPolicy::default(),
            duplicate_policy: DuplicatePolicy::default(),
            max_concurrent_schemas: 1,
        }
    }
}

impl CrawlOptions {
    /// Creates crawl options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates the options.
    ///
    /// # Errors
    /// Returns a configuration error if a value is out of range
    pub fn validate(&self) -> crate::Result<()> {
        if self.max_concurrent_schemas == 0 {
            return Err(CrawlError::configuration(
                "max_concurrent_schemas must be greater than 0",
            ));
        }

        if self.max_concurrent_schemas > 50 {
            return Err(CrawlError::configuration(
                "max_concurrent_schemas should not exceed 50",
            ));
        }

        if self.table_types.iter().any(|t| t.trim().is_empty()) {
            return Err(CrawlError::configuration("table_types cannot contain blanks"));
        }

        Ok(())
    }

    /// Parses and validates options from JSON.
    pub fn from_json_str(json: &str) -> crate::Result<Self> {
        let options: Self = serde_json::from_str(json).map_err(|e| CrawlError::Serialization {
            context: "Failed to parse crawl options".to_string(),
            source: e,
        })?;
        options.validate()?;
        Ok(options)
    }

    /// Loads and validates options from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> crate::Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| CrawlError::Io {
            context: format!("Failed to read crawl options from {}", path.display()),
            source: e,
        })?;
        Self::from_json_str(&json)
    }

    /// Builder method to set the detail level.
    pub fn with_detail_level(mut self, level: DetailLevel) -> Self {
        self.detail_level = level;
        self
    }

    /// Builder method to set the sort policy.
    pub fn with_sort_policy(mut self, policy: SortPolicy) -> Self {
        self.sort_policy = policy;
        self
    }

    /// Builder method to set the duplicate policy.
    pub fn with_duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicate_policy = policy;
        self
    }

    /// Builder method to set all inclusion rules.
    pub fn with_inclusion(mut self, inclusion: InclusionRules) -> Self {
        self.inclusion = inclusion;
        self
    }

    /// Builder method to set the schema rule.
    pub fn with_schema_rule(mut self, rule: InclusionRule) -> Self {
        self.inclusion.schemas = rule;
        self
    }

    /// Builder method to set the table rule.
    pub fn with_table_rule(mut self, rule: InclusionRule) -> Self {
        self.inclusion.tables = rule;
        self
    }

    /// Builder method to set the routine rule.
    pub fn with_routine_rule(mut self, rule: InclusionRule) -> Self {
        self.inclusion.routines = rule;
        self
    }

    /// Builder method to set the table types passed to the table query.
    pub fn with_table_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.table_types = types.into_iter().map(Into::into).collect();
        self
    }

    /// Builder method to set schema concurrency with validation.
    pub fn with_max_concurrent_schemas(mut self, max: usize) -> crate::Result<Self> {
        if max == 0 || max > 50 {
            return Err(CrawlError::configuration(
                "max_concurrent_schemas must be between 1 and 50",
            ));
        }
        self.max_concurrent_schemas = max;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crawl_options_default() {
        let options = CrawlOptions::default();
        assert_eq!(options.detail_level, DetailLevel::Standard);
        assert_eq!(options.sort_policy, SortPolicy::Natural);
        assert_eq!(options.table_types, vec!["TABLE", "VIEW"]);
        assert_eq!(options.max_concurrent_schemas, 1);
        assert!(!options.inclusion.tables.is_exclude_all());
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_default_duplicate_policy_follows_build() {
        let expected = if cfg!(debug_assertions) {
            DuplicatePolicy::Fail
        } else {
            DuplicatePolicy::MergeAndWarn
        };
        assert_eq!(DuplicatePolicy::default(), expected);
    }

    #[test]
    fn test_crawl_options_validation() {
        let options = CrawlOptions {
            max_concurrent_schemas: 0,
            ..Default::default()
        };
        assert!(options.validate().is_err());

        let options = CrawlOptions {
            max_concurrent_schemas: 51,
            ..Default::default()
        };
        assert!(options.validate().is_err());

        assert!(CrawlOptions::new().with_max_concurrent_schemas(8).is_ok());
        assert!(CrawlOptions::new().with_max_concurrent_schemas(0).is_err());

        let options = CrawlOptions::new().with_table_types(["TABLE", " "]);
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_rule_for_follows_table_rule() {
        let options = CrawlOptions::new().with_table_rule(InclusionRule::ExcludeAll);
        let rules = &options.inclusion;

        assert!(rules.rule_for(ObjectFamily::Tables).is_exclude_all());
        assert!(rules.rule_for(ObjectFamily::Indexes).is_exclude_all());
        assert!(rules.rule_for(ObjectFamily::ForeignKeys).is_exclude_all());
        assert!(!rules.rule_for(ObjectFamily::Routines).is_exclude_all());
        assert!(!rules.rule_for(ObjectFamily::ColumnDataTypes).is_exclude_all());
    }

    #[test]
    fn test_from_json_str() {
        let json = r#"{
            "detail_level": "maximum",
            "sort_policy": "alphabetical",
            "duplicate_policy": "merge-and-warn",
            "inclusion": {
                "tables": { "include": "PUBLIC\\..*" },
                "routines": "exclude-all"
            }
        }"#;

        let options = CrawlOptions::from_json_str(json).unwrap();
        assert_eq!(options.detail_level, DetailLevel::Maximum);
        assert_eq!(options.sort_policy, SortPolicy::Alphabetical);
        assert_eq!(options.duplicate_policy, DuplicatePolicy::MergeAndWarn);
        assert!(options.inclusion.tables.include("PUBLIC.INVOICE"));
        assert!(!options.inclusion.tables.include("SALES.INVOICE"));
        assert!(options.inclusion.routines.is_exclude_all());
        assert_eq!(options.table_types, vec!["TABLE", "VIEW"]);
    }

    #[test]
    fn test_from_json_str_rejects_invalid() {
        assert!(matches!(
            CrawlOptions::from_json_str("{ not json"),
            Err(CrawlError::Serialization { .. })
        ));
        assert!(matches!(
            CrawlOptions::from_json_str(r#"{"max_concurrent_schemas": 0}"#),
            Err(CrawlError::Configuration { .. })
        ));
    }

    #[test]
    fn test_from_json_file_missing() {
        let result = CrawlOptions::from_json_file("/nonexistent/dbcrawler/options.json");
        assert!(matches!(result, Err(CrawlError::Io { .. })));
    }
}
