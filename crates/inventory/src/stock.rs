use serde::{Deserialize, Serialize};

use retailpos_core::{DomainError, DomainResult, Entity};

record_id! {
    /// Identifier of a physical store (a stock location).
    StoreId
}

record_id! {
    /// Identifier of a catalog product.
    ProductId
}

/// Threshold applied to newly created stock records.
pub const DEFAULT_LOW_STOCK_THRESHOLD: i64 = 5;

/// Key of a stock record within a tenant: one row per (product, store).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StockKey {
    pub product_id: ProductId,
    pub store_id: StoreId,
}

impl StockKey {
    pub fn new(product_id: ProductId, store_id: StoreId) -> Self {
        Self {
            product_id,
            store_id,
        }
    }
}

impl core::fmt::Display for StockKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}@{}", self.product_id, self.store_id)
    }
}

/// On-hand quantity of one product at one store.
///
/// Quantity is deliberately not floored at zero: selling or transferring more
/// than is on hand drives it negative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockRecord {
    pub key: StockKey,
    pub quantity: i64,
    pub low_stock_threshold: i64,
    pub version: u64,
}

impl StockRecord {
    /// First record for a (product, store) pair, at version 1.
    pub fn new(key: StockKey, quantity: i64) -> Self {
        Self {
            key,
            quantity,
            low_stock_threshold: DEFAULT_LOW_STOCK_THRESHOLD,
            version: 1,
        }
    }

    pub fn with_threshold(mut self, threshold: i64) -> Self {
        self.low_stock_threshold = threshold;
        self
    }

    /// Next version of this record with `delta` applied.
    ///
    /// No floor at zero; only leaving the `i64` range is rejected.
    pub fn adjusted(&self, delta: i64) -> DomainResult<Self> {
        let quantity = self.quantity.checked_add(delta).ok_or_else(|| {
            DomainError::validation(format!(
                "stock {} out of range: {} {delta:+}",
                self.key, self.quantity
            ))
        })?;
        Ok(Self {
            quantity,
            version: self.version + 1,
            ..self.clone()
        })
    }

    pub fn is_low_stock(&self) -> bool {
        self.quantity <= self.low_stock_threshold
    }

    pub fn is_negative(&self) -> bool {
        self.quantity < 0
    }
}

impl Entity for StockRecord {
    type Id = StockKey;

    fn id(&self) -> &Self::Id {
        &self.key
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// One stock write that has been applied.
///
/// Ledger operations collect these so a caller can see how far a failed
/// operation got and compensate explicitly.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovement {
    pub key: StockKey,
    pub delta: i64,
    /// The write created the record instead of updating it.
    pub created: bool,
}

impl StockMovement {
    /// Movement that undoes this one.
    pub fn inverse(&self) -> Self {
        Self {
            key: self.key,
            delta: -self.delta,
            created: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn test_key() -> StockKey {
        StockKey::new(ProductId::generate(), StoreId::generate())
    }

    #[test]
    fn new_record_uses_default_threshold() {
        let record = StockRecord::new(test_key(), 12);
        assert_eq!(record.quantity, 12);
        assert_eq!(record.low_stock_threshold, 5);
        assert_eq!(record.version, 1);
        assert!(!record.is_low_stock());
    }

    #[test]
    fn adjusted_bumps_version_and_keeps_threshold() {
        let record = StockRecord::new(test_key(), 10).with_threshold(8);
        let next = record.adjusted(-3).unwrap();
        assert_eq!(next.quantity, 7);
        assert_eq!(next.version, 2);
        assert_eq!(next.low_stock_threshold, 8);
        assert!(next.is_low_stock());
    }

    #[test]
    fn adjusted_can_go_negative() {
        let record = StockRecord::new(test_key(), 2);
        let next = record.adjusted(-5).unwrap();
        assert_eq!(next.quantity, -3);
        assert!(next.is_negative());
    }

    #[test]
    fn adjusted_rejects_quantity_out_of_range() {
        let full = StockRecord::new(test_key(), i64::MAX);
        let err = full.adjusted(1).unwrap_err();
        assert!(matches!(err, DomainError::Validation(msg) if msg.contains("out of range")));

        let drained = StockRecord::new(test_key(), i64::MIN);
        assert!(drained.adjusted(-1).is_err());
        assert_eq!(drained.adjusted(1).unwrap().quantity, i64::MIN + 1);
    }

    #[test]
    fn inverse_movement_cancels_delta() {
        let movement = StockMovement {
            key: test_key(),
            delta: 10,
            created: true,
        };
        let inverse = movement.inverse();
        assert_eq!(inverse.delta, -10);
        assert!(!inverse.created);
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: moving `q` from one record to another conserves the pair total.
        #[test]
        fn paired_adjustment_conserves_total(
            source in -1_000i64..1_000_000i64,
            destination in -1_000i64..1_000_000i64,
            q in 1i64..10_000i64,
        ) {
            let src = StockRecord::new(test_key(), source);
            let dst = StockRecord::new(test_key(), destination);

            let src_after = src.adjusted(-q).unwrap();
            let dst_after = dst.adjusted(q).unwrap();

            prop_assert_eq!(src.quantity + dst.quantity, src_after.quantity + dst_after.quantity);
        }
    }
}
