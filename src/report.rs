// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Dashboard aggregates.
//!
//! Pure functions over product snapshots and register entries; nothing here
//! takes a lock beyond what producing the inputs took. "Today" is always a
//! parameter.

use crate::base::{ProductId, VariantId};
use crate::catalog::ProductSnapshot;
use crate::config::LedgerConfig;
use crate::engine::Engine;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

/// Expiration band of a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpiryStatus {
    /// Expired or expiring within the critical window.
    Critical,
    Warning,
    Ok,
}

impl ExpiryStatus {
    /// Bands a remaining day count using the configured windows.
    pub fn for_days(days: i64, config: &LedgerConfig) -> Self {
        if days <= config.expiry_critical_days {
            ExpiryStatus::Critical
        } else if days <= config.expiry_warning_days {
            ExpiryStatus::Warning
        } else {
            ExpiryStatus::Ok
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LowStockVariant {
    pub product_id: ProductId,
    pub variant_id: VariantId,
    pub product: String,
    pub variant: String,
    pub on_hand: u32,
    pub min_stock: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExpiringProduct {
    pub product_id: ProductId,
    pub product: String,
    pub expiration_date: NaiveDate,
    /// Negative once expired.
    pub days_left: i64,
    pub status: ExpiryStatus,
}

/// Units per category tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryStock {
    pub category: String,
    pub products: usize,
    pub units: u64,
}

/// Variants whose on-hand count is below their own minimum.
pub fn low_stock_variants(products: &[ProductSnapshot]) -> Vec<LowStockVariant> {
    products
        .iter()
        .flat_map(|p| {
            p.variants
                .iter()
                .filter(|v| v.on_hand < v.min_stock)
                .map(move |v| LowStockVariant {
                    product_id: p.id,
                    variant_id: v.id,
                    product: p.name.clone(),
                    variant: v.name.clone(),
                    on_hand: v.on_hand,
                    min_stock: v.min_stock,
                })
        })
        .collect()
}

/// Products whose total stock is below the product-wide minimum.
pub fn products_below_global_minimum(products: &[ProductSnapshot]) -> Vec<&ProductSnapshot> {
    products
        .iter()
        .filter(|p| p.total_stock() < u64::from(p.min_stock_global))
        .collect()
}

/// Products expiring within `within_days` of `today`, soonest first.
///
/// Already expired products are included.
pub fn expiring_products(
    products: &[ProductSnapshot],
    today: NaiveDate,
    within_days: i64,
    config: &LedgerConfig,
) -> Vec<ExpiringProduct> {
    let mut expiring: Vec<ExpiringProduct> = products
        .iter()
        .filter_map(|p| {
            let expiration_date = p.expiration_date?;
            let days_left = (expiration_date - today).num_days();
            (days_left <= within_days).then(|| ExpiringProduct {
                product_id: p.id,
                product: p.name.clone(),
                expiration_date,
                days_left,
                status: ExpiryStatus::for_days(days_left, config),
            })
        })
        .collect();
    expiring.sort_by_key(|e| (e.expiration_date, e.product_id));
    expiring
}

/// Sum over products of total on-hand units times unit price.
pub fn total_investment(products: &[ProductSnapshot]) -> Decimal {
    products
        .iter()
        .map(|p| Decimal::from(p.total_stock()) * p.price_per_unit)
        .sum()
}

/// On-hand units per category tag, sorted by tag.
///
/// Tags with no products are omitted.
pub fn stock_by_category(products: &[ProductSnapshot]) -> Vec<CategoryStock> {
    let mut by_tag: BTreeMap<&str, (usize, u64)> = BTreeMap::new();
    for product in products {
        let entry = by_tag.entry(product.category.as_str()).or_default();
        entry.0 += 1;
        entry.1 += product.total_stock();
    }
    by_tag
        .into_iter()
        .map(|(category, (products, units))| CategoryStock {
            category: category.to_string(),
            products,
            units,
        })
        .collect()
}

/// Dashboard summary at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dashboard {
    pub products: usize,
    pub total_units: u64,
    pub total_investment: Decimal,
    pub low_stock: Vec<LowStockVariant>,
    pub expiring: Vec<ExpiringProduct>,
    pub by_category: Vec<CategoryStock>,
}

impl Engine {
    /// Builds the dashboard summary from a fresh snapshot of the catalog.
    ///
    /// Expiring products use the configured warning window.
    pub fn dashboard(&self, today: NaiveDate) -> Dashboard {
        let products = self.products();
        let config = self.config();
        Dashboard {
            products: products.len(),
            total_units: products.iter().map(ProductSnapshot::total_stock).sum(),
            total_investment: total_investment(&products),
            low_stock: low_stock_variants(&products),
            expiring: expiring_products(&products, today, config.expiry_warning_days, config),
            by_category: stock_by_category(&products),
        }
    }

    /// Units handed to people per month of `year`, January first.
    pub fn units_assigned_by_month(&self, year: i32) -> [u64; 12] {
        self.register().units_assigned_by_month(year)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::VariantSnapshot;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn product(
        id: u32,
        name: &str,
        category: &str,
        stock: &[(u32, u32)],
        expiration_date: Option<NaiveDate>,
        price: Decimal,
    ) -> ProductSnapshot {
        ProductSnapshot {
            id: ProductId(id),
            name: name.into(),
            category: category.into(),
            min_stock_global: 10,
            last_purchase_date: date(2025, 1, 1),
            expiration_date,
            price_per_unit: price,
            variants: stock
                .iter()
                .enumerate()
                .map(|(i, (on_hand, min_stock))| VariantSnapshot {
                    id: VariantId(id * 10 + i as u32),
                    name: format!("V{i}"),
                    on_hand: *on_hand,
                    in_transit: 0,
                    min_stock: *min_stock,
                    barcodes: Vec::new(),
                })
                .collect(),
        }
    }

    fn inventory() -> Vec<ProductSnapshot> {
        vec![
            product(1, "Casco", "EPP", &[(4, 5), (8, 2)], Some(date(2025, 6, 4)), dec!(12.50)),
            product(2, "Guantes", "EPP", &[(3, 1)], Some(date(2025, 6, 20)), dec!(2)),
            product(3, "Alcohol", "Insumos", &[(40, 10)], Some(date(2025, 12, 1)), dec!(1.25)),
            product(4, "Conos", "Generales", &[(6, 2)], None, dec!(0)),
        ]
    }

    #[test]
    fn low_stock_is_per_variant() {
        let inventory = inventory();
        let low = low_stock_variants(&inventory);
        assert_eq!(low.len(), 1);
        assert_eq!((low[0].product.as_str(), low[0].variant.as_str()), ("Casco", "V0"));

        let below: Vec<&str> = products_below_global_minimum(&inventory)
            .iter()
            .map(|p| p.name.as_str())
            .collect();
        assert_eq!(below, vec!["Guantes", "Conos"]);
    }

    #[test]
    fn expiry_bands() {
        let config = LedgerConfig::default();
        let expiring = expiring_products(&inventory(), date(2025, 6, 1), 30, &config);
        assert_eq!(expiring.len(), 2);
        assert_eq!(expiring[0].days_left, 3);
        assert_eq!(expiring[0].status, ExpiryStatus::Critical);
        assert_eq!(expiring[1].status, ExpiryStatus::Warning);

        let later = expiring_products(&inventory(), date(2025, 7, 1), 30, &config);
        assert_eq!(later[0].days_left, -27);
        assert_eq!(later[0].status, ExpiryStatus::Critical);

        assert_eq!(ExpiryStatus::for_days(31, &config), ExpiryStatus::Ok);
        assert_eq!(ExpiryStatus::for_days(5, &config), ExpiryStatus::Critical);
        assert_eq!(ExpiryStatus::for_days(30, &config), ExpiryStatus::Warning);
    }

    #[test]
    fn investment_and_distribution() {
        assert_eq!(total_investment(&inventory()), dec!(206.00));

        let by_category = stock_by_category(&inventory());
        assert_eq!(by_category.len(), 3);
        assert_eq!(by_category[0].category, "EPP");
        assert_eq!(by_category[0].products, 2);
        assert_eq!(by_category[0].units, 15);
        assert_eq!(by_category[2].category, "Insumos");
    }
}
