//! Crawl report: warnings and per-family failures returned with the catalog.

use crate::models::ObjectFamily;
use serde::{Deserialize, Serialize};

/// Non-fatal condition recorded during a crawl.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CrawlWarning {
    /// A foreign key pointed at a column missing from the model and was dropped
    UnresolvedReference {
        table: String,
        foreign_key: String,
        local_columns: Vec<String>,
        target: String,
    },
    /// A second object with an existing full name was discarded
    DuplicateObject {
        family: ObjectFamily,
        full_name: String,
    },
    /// A column had no usable type name and got the unknown sentinel type
    UnknownDataType { owner: String, column: String },
}

impl std::fmt::Display for CrawlWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnresolvedReference {
                table,
                foreign_key,
                local_columns,
                target,
            } => write!(
                f,
                "Dropped foreign key {} on {} ({}): {} is not in the catalog",
                foreign_key,
                table,
                local_columns.join(", "),
                target
            ),
            Self::DuplicateObject { family, full_name } => {
                write!(f, "Discarded duplicate {} object {}", family, full_name)
            }
            Self::UnknownDataType { owner, column } => {
                write!(f, "Column {}.{} has no resolvable data type", owner, column)
            }
        }
    }
}

/// A family whose retrieval failed; objects attached before the failure are kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FamilyFailure {
    pub schema: String,
    pub family: ObjectFamily,
    pub owner: String,
    /// Full error chain
    pub message: String,
}

/// Warnings and failures accumulated over one crawl.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CrawlReport {
    pub failures: Vec<FamilyFailure>,
    pub warnings: Vec<CrawlWarning>,
}

impl CrawlReport {
    /// True when nothing went wrong
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.warnings.is_empty()
    }

    /// Records a warning and logs it
    pub fn warn(&mut self, warning: CrawlWarning) {
        tracing::warn!("{}", warning);
        self.warnings.push(warning);
    }

    /// Records a family failure and logs it
    pub fn record_failure(&mut self, failure: FamilyFailure) {
        tracing::warn!(
            "Failed to retrieve {} for {} in schema '{}': {}",
            failure.family,
            failure.owner,
            failure.schema,
            failure.message
        );
        self.failures.push(failure);
    }

    /// Appends another report without logging again
    pub fn merge(&mut self, other: CrawlReport) {
        self.failures.extend(other.failures);
        self.warnings.extend(other.warnings);
    }

    /// Failures recorded for one family
    pub fn failures_for(&self, family: ObjectFamily) -> impl Iterator<Item = &FamilyFailure> {
        self.failures.iter().filter(move |f| f.family == family)
    }

    /// One-line summary for logs
    pub fn summary(&self) -> String {
        format!(
            "{} failure(s), {} warning(s)",
            self.failures.len(),
            self.warnings.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_accumulates() {
        let mut report = CrawlReport::default();
        assert!(report.is_clean());

        report.warn(CrawlWarning::UnknownDataType {
            owner: "PUBLIC.INVOICE".to_string(),
            column: "TOTAL".to_string(),
        });
        report.record_failure(FamilyFailure {
            schema: "PUBLIC".to_string(),
            family: ObjectFamily::Indexes,
            owner: "PUBLIC.INVOICE".to_string(),
            message: "boom".to_string(),
        });

        assert!(!report.is_clean());
        assert_eq!(report.failures_for(ObjectFamily::Indexes).count(), 1);
        assert_eq!(report.failures_for(ObjectFamily::Columns).count(), 0);
        assert_eq!(report.summary(), "1 failure(s), 1 warning(s)");
    }

    #[test]
    fn test_warning_serialization_is_tagged() {
        let warning = CrawlWarning::DuplicateObject {
            family: ObjectFamily::Tables,
            full_name: "PUBLIC.T".to_string(),
        };
        let json = serde_json::to_value(&warning).unwrap();
        assert_eq!(json["kind"], "duplicate_object");
        assert_eq!(json["family"], "tables");
    }

    #[test]
    fn test_unresolved_reference_message() {
        let warning = CrawlWarning::UnresolvedReference {
            table: "PUBLIC.ITEM".to_string(),
            foreign_key: "FK_ITEM_PRODUCT".to_string(),
            local_columns: vec!["PRODUCTID".to_string()],
            target: "PUBLIC.PRODUCT.ID".to_string(),
        };
        let message = warning.to_string();
        assert!(message.contains("FK_ITEM_PRODUCT"));
        assert!(message.contains("PUBLIC.PRODUCT.ID"));
    }
}
