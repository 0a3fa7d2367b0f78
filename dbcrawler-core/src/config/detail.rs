//! Detail levels and what each one retrieves.

use crate::models::ObjectFamily;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Ordered setting controlling which families a crawl retrieves.
///
/// Every level retrieves a superset of the level below it.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum DetailLevel {
    Minimum,
    Basic,
    #[default]
    Standard,
    Detailed,
    Maximum,
}

/// How much of each row a retriever keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AttributeDepth {
    /// Names and structural fields only; remarks are dropped
    NamesOnly,
    /// Every recognised field
    Full,
    /// Every recognised field plus unrecognised fields as attributes
    Extended,
}

impl DetailLevel {
    /// All levels, lowest first
    pub const ALL: [Self; 5] = [
        Self::Minimum,
        Self::Basic,
        Self::Standard,
        Self::Detailed,
        Self::Maximum,
    ];

    /// Lowest level at which a family is retrieved.
    fn threshold(family: ObjectFamily) -> Self {
        match family {
            ObjectFamily::Schemas | ObjectFamily::Tables | ObjectFamily::Routines => Self::Minimum,
            ObjectFamily::Columns => Self::Basic,
            ObjectFamily::PrimaryKeys
            | ObjectFamily::ColumnDataTypes
            | ObjectFamily::Indexes
            | ObjectFamily::ForeignKeys
            | ObjectFamily::RoutineColumns => Self::Standard,
            ObjectFamily::Sequences | ObjectFamily::Synonyms => Self::Detailed,
        }
    }

    /// Whether a family's retriever runs at this level
    pub fn retrieves(self, family: ObjectFamily) -> bool {
        self >= Self::threshold(family)
    }

    /// Attribute depth for a family at this level.
    ///
    /// Only meaningful when [`retrieves`](Self::retrieves) is true.
    pub fn depth(self, family: ObjectFamily) -> AttributeDepth {
        let extends = matches!(
            family,
            ObjectFamily::Tables
                | ObjectFamily::Routines
                | ObjectFamily::Columns
                | ObjectFamily::RoutineColumns
                | ObjectFamily::Sequences
                | ObjectFamily::Synonyms
        );
        match self {
            Self::Minimum => AttributeDepth::NamesOnly,
            Self::Maximum if extends => AttributeDepth::Extended,
            _ => AttributeDepth::Full,
        }
    }

    /// Families retrieved at this level, in retrieval order
    pub fn families(self) -> Vec<ObjectFamily> {
        ObjectFamily::RETRIEVAL_ORDER
            .into_iter()
            .filter(|family| self.retrieves(*family))
            .collect()
    }
}

impl std::fmt::Display for DetailLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Minimum => "minimum",
            Self::Basic => "basic",
            Self::Standard => "standard",
            Self::Detailed => "detailed",
            Self::Maximum => "maximum",
        };
        f.write_str(name)
    }
}

impl FromStr for DetailLevel {
    type Err = crate::error::CrawlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|level| level.to_string().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                crate::error::CrawlError::configuration(format!(
                    "Unknown detail level '{}', expected one of: minimum, basic, standard, detailed, maximum",
                    s
                ))
            })
    }
}
