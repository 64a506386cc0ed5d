use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use retailpos_core::{AggregateRoot, DomainError, TenantId, UserId};

use crate::stock::{ProductId, StoreId};

record_id! {
    /// Sale (point-of-sale transaction) identifier.
    SaleId
}

/// Sale status.
///
/// Settable independently of stock: inventory is decremented once, when the
/// sale is recorded, whatever status it later moves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaleStatus {
    Pending,
    Completed,
    Cancelled,
    Refunded,
}

impl core::fmt::Display for SaleStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            SaleStatus::Pending => "pending",
            SaleStatus::Completed => "completed",
            SaleStatus::Cancelled => "cancelled",
            SaleStatus::Refunded => "refunded",
        };
        f.write_str(s)
    }
}

impl core::str::FromStr for SaleStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(SaleStatus::Pending),
            "completed" => Ok(SaleStatus::Completed),
            "cancelled" => Ok(SaleStatus::Cancelled),
            "refunded" => Ok(SaleStatus::Refunded),
            other => Err(DomainError::validation(format!("unknown sale status '{other}'"))),
        }
    }
}

/// Sale line as submitted by the till.
///
/// Lines can arrive partially filled in (e.g. a free-text line with no
/// product); only lines carrying both a product and a quantity touch stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SaleItem {
    pub product_id: Option<ProductId>,
    pub quantity: Option<i64>,
    /// Price in smallest currency unit (e.g., cents).
    pub unit_price: Option<u64>,
}

impl SaleItem {
    pub fn new(product_id: ProductId, quantity: i64, unit_price: u64) -> Self {
        Self {
            product_id: Some(product_id),
            quantity: Some(quantity),
            unit_price: Some(unit_price),
        }
    }

    /// `(product, quantity)` when this line affects stock.
    pub fn stock_line(&self) -> Option<(ProductId, i64)> {
        match (self.product_id, self.quantity) {
            (Some(product_id), Some(quantity)) => Some((product_id, quantity)),
            _ => None,
        }
    }

    pub fn line_total(&self) -> Option<i128> {
        match (self.quantity, self.unit_price) {
            (Some(q), Some(p)) => Some(q as i128 * p as i128),
            _ => None,
        }
    }
}

/// Aggregate root: a completed point-of-sale transaction at one store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sale {
    pub id: SaleId,
    pub tenant_id: TenantId,
    pub store_id: StoreId,
    pub user_id: UserId,
    pub items: Vec<SaleItem>,
    pub status: SaleStatus,
    pub created_at: DateTime<Utc>,
    pub version: u64,
}

impl Sale {
    pub fn new(
        id: SaleId,
        tenant_id: TenantId,
        store_id: StoreId,
        user_id: UserId,
        items: Vec<SaleItem>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            tenant_id,
            store_id,
            user_id,
            items,
            status: SaleStatus::Completed,
            created_at,
            version: 1,
        }
    }

    /// Sum of priced lines; lines missing a quantity or price contribute nothing.
    pub fn total(&self) -> i128 {
        self.items.iter().filter_map(SaleItem::line_total).sum()
    }

    pub fn set_status(&mut self, status: SaleStatus) {
        if self.status != status {
            self.status = status;
            self.version += 1;
        }
    }
}

impl AggregateRoot for Sale {
    type Id = SaleId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_sale(items: Vec<SaleItem>) -> Sale {
        Sale::new(
            SaleId::generate(),
            TenantId::new(),
            StoreId::generate(),
            UserId::new(),
            items,
            Utc::now(),
        )
    }

    #[test]
    fn only_complete_lines_touch_stock() {
        let product = ProductId::generate();
        let sale = test_sale(vec![
            SaleItem::new(product, 2, 150),
            SaleItem {
                product_id: None,
                quantity: Some(1),
                unit_price: Some(99),
            },
            SaleItem {
                product_id: Some(ProductId::generate()),
                quantity: None,
                unit_price: None,
            },
        ]);

        let lines: Vec<_> = sale.items.iter().filter_map(SaleItem::stock_line).collect();
        assert_eq!(lines, vec![(product, 2)]);
    }

    #[test]
    fn total_skips_unpriced_lines() {
        let sale = test_sale(vec![
            SaleItem::new(ProductId::generate(), 3, 250),
            SaleItem {
                product_id: Some(ProductId::generate()),
                quantity: Some(1),
                unit_price: None,
            },
        ]);
        assert_eq!(sale.total(), 750);
    }

    #[test]
    fn set_status_bumps_version_only_on_change() {
        let mut sale = test_sale(vec![]);
        assert_eq!(sale.status, SaleStatus::Completed);

        sale.set_status(SaleStatus::Completed);
        assert_eq!(sale.version, 1);

        sale.set_status(SaleStatus::Refunded);
        assert_eq!(sale.status, SaleStatus::Refunded);
        assert_eq!(sale.version, 2);
    }

    #[test]
    fn status_parses_from_wire_names() {
        assert_eq!("refunded".parse::<SaleStatus>().unwrap(), SaleStatus::Refunded);
        assert!("void".parse::<SaleStatus>().is_err());
    }

    #[test]
    fn missing_fields_deserialize_as_none() {
        let item: SaleItem = serde_json::from_value(serde_json::json!({ "quantity": 4 })).unwrap();
        assert_eq!(item.quantity, Some(4));
        assert_eq!(item.product_id, None);
        assert!(item.stock_line().is_none());
    }
}
