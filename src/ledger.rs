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

//! Stock ledger: validated quantity movements addressed by name.
//!
//! Every mutation is staged against a copy of the locked counters first and
//! written back, with a journal entry, only if staging succeeded. Nothing
//! is clamped; a request that would drive a counter below zero is refused
//! untouched.

use crate::base::{ProductId, VariantId};
use crate::catalog::{Catalog, NewProduct, NewVariant, StockHandle, VariantRef};
use crate::config::LedgerConfig;
use crate::error::LedgerError;
use crate::journal::{Journal, MovementKind};
use crate::stock::StockLevels;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::{debug, info};

/// Owns the catalog and the movement journal.
#[derive(Debug)]
pub struct StockLedger {
    catalog: Catalog,
    journal: Journal,
    config: LedgerConfig,
}

impl StockLedger {
    pub fn new(config: LedgerConfig) -> Self {
        Self {
            catalog: Catalog::new(&config),
            journal: Journal::with_capacity(config.journal_capacity),
            config,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Computes the counters that would result from a movement, without
    /// touching the originals.
    pub(crate) fn stage(
        target: &VariantRef,
        levels: StockLevels,
        kind: MovementKind,
        quantity: u32,
    ) -> Result<StockLevels, LedgerError> {
        let mut next = levels;
        let result = match kind {
            MovementKind::Entry => next.credit_on_hand(quantity),
            MovementKind::Exit | MovementKind::Assignment => next.debit_on_hand(quantity),
            MovementKind::TransitOut => next.move_to_transit(quantity),
            MovementKind::TransitReturn => next.return_from_transit(quantity),
        };
        result.map_err(|shortfall| shortfall.into_error(&target.product, &target.variant))?;
        Ok(next)
    }

    /// Writes staged counters into a locked variant and journals the movement.
    ///
    /// `staged` must come from [`StockLedger::stage`] on the same locked
    /// counters; bulk commits stage every variant first and only then write.
    pub(crate) fn write_staged(
        &self,
        target: &VariantRef,
        levels: &mut StockLevels,
        staged: StockLevels,
        kind: MovementKind,
        quantity: u32,
    ) {
        *levels = staged;
        self.journal
            .record(target.product_id, target.variant_id, kind, quantity);
        debug!(
            product = %target.product,
            variant = %target.variant,
            ?kind,
            quantity,
            on_hand = levels.on_hand(),
            in_transit = levels.in_transit(),
            "movement applied"
        );
    }

    fn apply(
        &self,
        product: &str,
        variant: &str,
        kind: MovementKind,
        quantity: u32,
    ) -> Result<StockLevels, LedgerError> {
        let handle = self.catalog.resolve(product, variant)?;
        let mut levels = handle.stock().lock();
        let staged = Self::stage(&handle.target, *levels, kind, quantity)?;
        self.write_staged(&handle.target, &mut levels, staged, kind, quantity);
        Ok(staged)
    }

    /// Removes units from on-hand stock as an exit.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::UnknownCatalogReference`] - Product or variant unknown.
    /// - [`LedgerError::InvalidQuantity`] - Quantity is zero.
    /// - [`LedgerError::InsufficientStock`] - Quantity exceeds on-hand stock.
    pub fn debit_on_hand(
        &self,
        product: &str,
        variant: &str,
        quantity: u32,
    ) -> Result<StockLevels, LedgerError> {
        self.apply(product, variant, MovementKind::Exit, quantity)
    }

    /// Adds units to on-hand stock.
    pub fn credit_on_hand(
        &self,
        product: &str,
        variant: &str,
        quantity: u32,
    ) -> Result<StockLevels, LedgerError> {
        self.apply(product, variant, MovementKind::Entry, quantity)
    }

    /// Moves units from on-hand to in-transit.
    pub fn move_to_transit(
        &self,
        product: &str,
        variant: &str,
        quantity: u32,
    ) -> Result<StockLevels, LedgerError> {
        self.apply(product, variant, MovementKind::TransitOut, quantity)
    }

    /// Moves units from in-transit back to on-hand.
    ///
    /// # Errors
    ///
    /// [`LedgerError::InsufficientTransitStock`] if fewer units are in transit.
    pub fn return_from_transit(
        &self,
        product: &str,
        variant: &str,
        quantity: u32,
    ) -> Result<StockLevels, LedgerError> {
        self.apply(product, variant, MovementKind::TransitReturn, quantity)
    }

    /// Adds a product, journaling each variant's opening stock as an entry.
    pub fn add_product(&self, new: NewProduct) -> Result<ProductId, LedgerError> {
        let product_id = self.catalog.add_product(new)?;
        if let Some(product) = self.catalog.product(product_id) {
            for variant in product.variants.iter().filter(|v| v.on_hand > 0) {
                self.journal
                    .record(product_id, variant.id, MovementKind::Entry, variant.on_hand);
            }
        }
        Ok(product_id)
    }

    /// Provisions a variant on an existing product.
    pub fn create_variant(
        &self,
        product: &str,
        name: &str,
        initial_on_hand: u32,
        min_stock: u32,
    ) -> Result<StockHandle, LedgerError> {
        let product_id =
            self.catalog
                .product_id(product)
                .ok_or_else(|| LedgerError::UnknownCatalogReference {
                    product: product.trim().to_string(),
                    variant: None,
                })?;
        let variant_id = self
            .catalog
            .add_variant(product_id, NewVariant::new(name, initial_on_hand, min_stock))?;
        self.journal_opening(product_id, variant_id, initial_on_hand);
        self.catalog.resolve(product, name)
    }

    /// Provisions a product with a single variant and the configured defaults.
    ///
    /// The product is filed under the fallback category, priced at zero,
    /// and `date` becomes its last purchase date.
    pub fn create_product(
        &self,
        name: &str,
        default_variant_name: &str,
        quantity: u32,
        date: NaiveDate,
    ) -> Result<StockHandle, LedgerError> {
        let product_id = self.catalog.add_product(NewProduct {
            name: name.to_string(),
            category: self.config.fallback_category.clone(),
            variants: vec![NewVariant::new(
                default_variant_name,
                quantity,
                self.config.default_min_stock,
            )],
            min_stock_global: self.config.default_min_stock,
            last_purchase_date: date,
            expiration_date: None,
            price_per_unit: Decimal::ZERO,
        })?;
        let handle = self.catalog.resolve(name, default_variant_name)?;
        self.journal_opening(product_id, handle.target.variant_id, quantity);
        info!(product = %name, variant = %default_variant_name, quantity, "product provisioned");
        Ok(handle)
    }

    fn journal_opening(&self, product_id: ProductId, variant_id: VariantId, quantity: u32) {
        if quantity > 0 {
            self.journal
                .record(product_id, variant_id, MovementKind::Entry, quantity);
        }
    }

    /// Resolves a reference, provisioning the product or variant with zero
    /// stock if it does not exist yet.
    ///
    /// A blank variant name on a new product uses the configured default
    /// variant name.
    pub(crate) fn resolve_or_provision(
        &self,
        product: &str,
        variant: &str,
        date: NaiveDate,
    ) -> Result<StockHandle, LedgerError> {
        if let Ok(handle) = self.catalog.resolve(product, variant) {
            return Ok(handle);
        }

        let created = if self.catalog.product_id(product).is_none() {
            let variant = if variant.trim().is_empty() {
                self.config.default_variant_name.as_str()
            } else {
                variant
            };
            self.create_product(product, variant, 0, date)
        } else {
            self.create_variant(product, variant, 0, self.config.default_min_stock)
        };

        match created {
            Ok(handle) => Ok(handle),
            // Another submission provisioned the same name first.
            Err(LedgerError::DuplicateProduct(_) | LedgerError::DuplicateVariant { .. }) => {
                self.catalog.resolve(product, variant)
            }
            Err(e) => Err(e),
        }
    }
}
