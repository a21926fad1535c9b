use std::collections::HashMap;

use crate::ident::normalize;
use crate::model::ProviderOrder;

/// Provider orders keyed by normalized merchant identifier.
pub struct ProviderIndex<'a> {
    by_id: HashMap<String, &'a ProviderOrder>,
    duplicates: usize,
    unkeyed: usize,
}

impl<'a> ProviderIndex<'a> {
    /// Build the index. The first record for an identifier wins; later
    /// duplicates are dropped. Records without a usable identifier are skipped.
    pub fn build(orders: &'a [ProviderOrder]) -> Self {
        let mut by_id = HashMap::with_capacity(orders.len());
        let mut duplicates = 0;
        let mut unkeyed = 0;

        for order in orders {
            let key = order
                .external_reference_id
                .as_deref()
                .map(normalize)
                .unwrap_or_default();
            if key.is_empty() {
                unkeyed += 1;
                log::debug!(
                    "provider order {} has no merchant reference, skipping",
                    order.provider_order_id
                );
                continue;
            }
            if by_id.contains_key(&key) {
                duplicates += 1;
                log::warn!(
                    "duplicate provider record for order {key} (provider id {}), keeping the first",
                    order.provider_order_id
                );
                continue;
            }
            by_id.insert(key, order);
        }

        Self {
            by_id,
            duplicates,
            unkeyed,
        }
    }

    /// Look up by ledger identifier (normalized here).
    pub fn get(&self, ledger_order_id: &str) -> Option<&'a ProviderOrder> {
        self.by_id.get(&normalize(ledger_order_id)).copied()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn duplicates(&self) -> usize {
        self.duplicates
    }

    pub fn unkeyed(&self) -> usize {
        self.unkeyed
    }
}
