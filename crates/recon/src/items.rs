use rust_decimal::Decimal;

use crate::config::ReconConfig;
use crate::model::LineItem;

/// Provider-side item counting: packaging exclusion and bundle expansion.
#[derive(Debug, Clone)]
pub struct ItemCountRules {
    expand_bundles: bool,
    /// Lowercased; empty when packaging exclusion is off.
    packaging_keywords: Vec<String>,
}

impl ItemCountRules {
    pub fn from_config(config: &ReconConfig) -> Self {
        let packaging_keywords = if config.exclude_packaging {
            config
                .packaging_keywords
                .iter()
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect()
        } else {
            Vec::new()
        };
        Self {
            expand_bundles: config.expand_bundles,
            packaging_keywords,
        }
    }

    /// Case-insensitive substring match against the packaging keywords.
    pub fn is_packaging(&self, name: &str) -> bool {
        if self.packaging_keywords.is_empty() {
            return false;
        }
        let name = name.to_lowercase();
        self.packaging_keywords.iter().any(|k| name.contains(k.as_str()))
    }

    /// Units one line contributes. A bundle with components counts as the sum
    /// of its (recursively counted) components when expansion is on.
    pub fn line_count(&self, item: &LineItem) -> Decimal {
        if self.is_packaging(&item.name) {
            return Decimal::ZERO;
        }
        if self.expand_bundles && item.is_bundle && !item.components.is_empty() {
            return self.order_count(&item.components);
        }
        item.quantity
    }

    pub fn order_count(&self, items: &[LineItem]) -> Decimal {
        items.iter().map(|i| self.line_count(i)).sum()
    }
}
