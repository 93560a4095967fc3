//! Versioned checklist catalog driving the ten-part analysis
//!
//! The catalog is a static data asset compiled into the binary, validated
//! once at startup. Its schema (camelCase, as in the JSON file) is part of
//! the public contract.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("catalog parse error: {0}")]
    Parse(String),

    #[error("catalog invalid: {0}")]
    Invalid(String),
}

pub type CatalogResult<T> = Result<T, CatalogError>;

/// One prose question from a part's deep-dive checklist
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct ChecklistItem {
    pub text: String,
}

/// One of the ten analysis parts
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChecklistPart {
    pub part_number: u8,
    pub part_title: String,
    pub core_question: String,
    pub top_risk_pattern: String,
    pub cross_clause_analysis: Vec<String>,
    pub mitigation_strategy: String,
    pub deep_dive_checklist: Vec<ChecklistItem>,
}

/// The versioned catalog of all analysis parts
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Catalog {
    pub version: String,
    pub analysis_parts: Vec<ChecklistPart>,
}

const BUILTIN_CATALOG: &str = include_str!("../../assets/checklist.json");

/// Parts are numbered 1 through 10
pub const PART_COUNT: u8 = 10;

impl Catalog {
    /// Load and validate the compiled-in catalog
    pub fn builtin() -> CatalogResult<Self> {
        Self::from_json(BUILTIN_CATALOG)
    }

    /// Load and validate a catalog from JSON
    pub fn from_json(json: &str) -> CatalogResult<Self> {
        let catalog: Catalog = serde_json::from_str(json).map_err(|e| CatalogError::Parse(e.to_string()))?;
        catalog.validate()?;
        Ok(catalog)
    }

    fn validate(&self) -> CatalogResult<()> {
        if self.version.trim().is_empty() {
            return Err(CatalogError::Invalid("missing version".to_string()));
        }
        if self.analysis_parts.len() != PART_COUNT as usize {
            return Err(CatalogError::Invalid(format!(
                "expected {} parts, found {}",
                PART_COUNT,
                self.analysis_parts.len()
            )));
        }

        let mut seen = [false; PART_COUNT as usize + 1];
        for part in &self.analysis_parts {
            if part.part_number == 0 || part.part_number > PART_COUNT {
                return Err(CatalogError::Invalid(format!(
                    "part number {} out of range 1..={}",
                    part.part_number, PART_COUNT
                )));
            }
            if seen[part.part_number as usize] {
                return Err(CatalogError::Invalid(format!("duplicate part number {}", part.part_number)));
            }
            seen[part.part_number as usize] = true;

            if part.part_title.trim().is_empty()
                || part.core_question.trim().is_empty()
                || part.top_risk_pattern.trim().is_empty()
            {
                return Err(CatalogError::Invalid(format!(
                    "part {} has empty title, core question, or risk pattern",
                    part.part_number
                )));
            }
            if part.deep_dive_checklist.is_empty() {
                return Err(CatalogError::Invalid(format!(
                    "part {} has an empty deep-dive checklist",
                    part.part_number
                )));
            }
            if part.deep_dive_checklist.iter().any(|i| i.text.trim().is_empty()) {
                return Err(CatalogError::Invalid(format!("part {} has a blank checklist item", part.part_number)));
            }
        }

        Ok(())
    }

    /// Look up a part by its number
    pub fn part(&self, number: u8) -> Option<&ChecklistPart> {
        self.analysis_parts.iter().find(|p| p.part_number == number)
    }

    /// All part numbers in ascending order
    pub fn part_numbers(&self) -> Vec<u8> {
        let mut numbers: Vec<u8> = self.analysis_parts.iter().map(|p| p.part_number).collect();
        numbers.sort_unstable();
        numbers
    }
}
