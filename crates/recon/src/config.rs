use rust_decimal::Decimal;
use serde::Deserialize;

use crate::error::ReconError;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Engine settings. Lives under `[reconcile]` in `ordercheck.toml`; every
/// field has a default so an empty table is valid.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReconConfig {
    /// Largest absolute cost delta still treated as rounding noise.
    pub tolerance: Decimal,
    /// Count a bundle line as the sum of its components.
    pub expand_bundles: bool,
    /// Drop lines whose name contains a packaging keyword from item counts.
    pub exclude_packaging: bool,
    pub packaging_keywords: Vec<String>,
}

pub const DEFAULT_PACKAGING_KEYWORDS: &[&str] =
    &["packaging", "shipping box", "gift box", "carton", "mailer"];

impl Default for ReconConfig {
    fn default() -> Self {
        Self {
            tolerance: Decimal::ZERO,
            expand_bundles: true,
            exclude_packaging: true,
            packaging_keywords: DEFAULT_PACKAGING_KEYWORDS
                .iter()
                .map(|k| k.to_string())
                .collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Ledger columns
// ---------------------------------------------------------------------------

/// Extra header synonyms per ledger field (`[ledger.columns]`). Tried before
/// the built-in synonym table.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ColumnSynonyms {
    pub order: Vec<String>,
    pub quantity: Vec<String>,
    pub unit_cost: Vec<String>,
    pub order_total: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub columns: ColumnSynonyms,
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl ReconConfig {
    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let config: ReconConfig =
            toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        if self.tolerance < Decimal::ZERO {
            return Err(ReconError::ConfigValidation(format!(
                "tolerance must not be negative, got {}",
                self.tolerance
            )));
        }

        if self.exclude_packaging {
            if let Some(i) = self.packaging_keywords.iter().position(|k| k.trim().is_empty()) {
                return Err(ReconError::ConfigValidation(format!(
                    "packaging_keywords[{i}] is empty (it would match every line)"
                )));
            }
        }

        Ok(())
    }
}

impl LedgerConfig {
    pub fn validate(&self) -> Result<(), ReconError> {
        let c = &self.columns;
        for (field, list) in [
            ("order", &c.order),
            ("quantity", &c.quantity),
            ("unit_cost", &c.unit_cost),
            ("order_total", &c.order_total),
        ] {
            if list.iter().any(|s| s.trim().is_empty()) {
                return Err(ReconError::ConfigValidation(format!(
                    "ledger.columns.{field} contains an empty synonym"
                )));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
