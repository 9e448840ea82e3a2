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

//! Product, variant and category-tag directory.
//!
//! Names are stored as typed and matched trimmed and case-insensitively,
//! everywhere: ledger, register and bulk paths all resolve through
//! [`Catalog::resolve`]. Barcodes are unique across the whole catalog.
//!
//! # Lock order
//!
//! The category list is locked before the product map, and a product map
//! guard may be held while touching the name or barcode indexes. The
//! reverse never happens.

use crate::base::{IdSequence, ProductId, VariantId, lookup_key};
use crate::config::LedgerConfig;
use crate::error::LedgerError;
use crate::stock::{SharedStock, StockLevels};
use chrono::NaiveDate;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use tracing::info;

#[derive(Debug)]
struct Variant {
    id: VariantId,
    name: String,
    min_stock: u32,
    barcodes: BTreeSet<String>,
    stock: SharedStock,
}

#[derive(Debug)]
struct Product {
    id: ProductId,
    name: String,
    category: String,
    min_stock_global: u32,
    last_purchase_date: NaiveDate,
    expiration_date: Option<NaiveDate>,
    price_per_unit: Decimal,
    variants: Vec<Variant>,
}

impl Product {
    fn variant(&self, name: &str) -> Option<&Variant> {
        let key = lookup_key(name);
        self.variants.iter().find(|v| lookup_key(&v.name) == key)
    }

    fn handle(&self, variant: &Variant) -> StockHandle {
        StockHandle {
            target: VariantRef {
                product_id: self.id,
                variant_id: variant.id,
                product: self.name.clone(),
                variant: variant.name.clone(),
            },
            stock: variant.stock.clone(),
        }
    }

    fn snapshot(&self) -> ProductSnapshot {
        ProductSnapshot {
            id: self.id,
            name: self.name.clone(),
            category: self.category.clone(),
            min_stock_global: self.min_stock_global,
            last_purchase_date: self.last_purchase_date,
            expiration_date: self.expiration_date,
            price_per_unit: self.price_per_unit,
            variants: self
                .variants
                .iter()
                .map(|v| {
                    let levels = v.stock.levels();
                    VariantSnapshot {
                        id: v.id,
                        name: v.name.clone(),
                        on_hand: levels.on_hand(),
                        in_transit: levels.in_transit(),
                        min_stock: v.min_stock,
                        barcodes: v.barcodes.iter().cloned().collect(),
                    }
                })
                .collect(),
        }
    }
}

/// Variant to create, with its opening stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewVariant {
    pub name: String,
    pub on_hand: u32,
    pub min_stock: u32,
    #[serde(default)]
    pub barcodes: Vec<String>,
}

impl NewVariant {
    pub fn new(name: impl Into<String>, on_hand: u32, min_stock: u32) -> Self {
        Self {
            name: name.into(),
            on_hand,
            min_stock,
            barcodes: Vec::new(),
        }
    }

    pub fn with_barcode(mut self, code: impl Into<String>) -> Self {
        self.barcodes.push(code.into());
        self
    }
}

/// Product to create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub category: String,
    pub variants: Vec<NewVariant>,
    pub min_stock_global: u32,
    pub last_purchase_date: NaiveDate,
    pub expiration_date: Option<NaiveDate>,
    pub price_per_unit: Decimal,
}

/// Partial edit of a product's descriptive fields. `None` leaves a field as is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub category: Option<String>,
    pub min_stock_global: Option<u32>,
    pub last_purchase_date: Option<NaiveDate>,
    pub expiration_date: Option<Option<NaiveDate>>,
    pub price_per_unit: Option<Decimal>,
}

/// Owned, point-in-time view of a variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VariantSnapshot {
    pub id: VariantId,
    pub name: String,
    pub on_hand: u32,
    pub in_transit: u32,
    pub min_stock: u32,
    pub barcodes: Vec<String>,
}

/// Owned, point-in-time view of a product.
///
/// Variant counters are read one at a time, so a snapshot taken during a
/// commit may mix pre- and post-commit values across variants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductSnapshot {
    pub id: ProductId,
    pub name: String,
    pub category: String,
    pub min_stock_global: u32,
    pub last_purchase_date: NaiveDate,
    pub expiration_date: Option<NaiveDate>,
    pub price_per_unit: Decimal,
    pub variants: Vec<VariantSnapshot>,
}

impl ProductSnapshot {
    /// Sum of on-hand units over all variants.
    pub fn total_stock(&self) -> u64 {
        self.variants.iter().map(|v| u64::from(v.on_hand)).sum()
    }

    pub fn variant(&self, name: &str) -> Option<&VariantSnapshot> {
        let key = lookup_key(name);
        self.variants.iter().find(|v| lookup_key(&v.name) == key)
    }
}

/// Resolved identity of a variant, with names captured at resolution time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VariantRef {
    pub product_id: ProductId,
    pub variant_id: VariantId,
    pub product: String,
    pub variant: String,
}

/// A resolved variant together with a handle to its counters.
#[derive(Debug, Clone)]
pub struct StockHandle {
    pub target: VariantRef,
    stock: SharedStock,
}

impl StockHandle {
    pub fn stock(&self) -> &SharedStock {
        &self.stock
    }

    pub fn levels(&self) -> StockLevels {
        self.stock.levels()
    }
}

/// Product directory keyed by stable IDs with case-insensitive name lookup.
#[derive(Debug)]
pub struct Catalog {
    products: DashMap<ProductId, Product>,
    /// Lookup key of the product name to its ID.
    names: DashMap<String, ProductId>,
    barcodes: DashMap<String, (ProductId, VariantId)>,
    categories: RwLock<Vec<String>>,
    fallback_category: String,
    product_ids: IdSequence,
    variant_ids: IdSequence,
}

impl Catalog {
    /// Creates an empty catalog seeded with the configured category tags.
    ///
    /// The fallback category is always present.
    pub fn new(config: &LedgerConfig) -> Self {
        let mut categories: Vec<String> = Vec::new();
        for tag in config
            .categories
            .iter()
            .chain(std::iter::once(&config.fallback_category))
        {
            let tag = tag.trim();
            if !tag.is_empty() && !categories.iter().any(|c| lookup_key(c) == lookup_key(tag)) {
                categories.push(tag.to_string());
            }
        }

        Self {
            products: DashMap::new(),
            names: DashMap::new(),
            barcodes: DashMap::new(),
            categories: RwLock::new(categories),
            fallback_category: config.fallback_category.trim().to_string(),
            product_ids: IdSequence::new(),
            variant_ids: IdSequence::new(),
        }
    }

    /// Adds a product with its variants and opening stock.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::EmptyName`] - Product or variant name is blank.
    /// - [`LedgerError::EmptyVariants`] - No variants given.
    /// - [`LedgerError::DuplicateVariant`] - Two variants share a name.
    /// - [`LedgerError::UnknownCategory`] - Category is not a managed tag.
    /// - [`LedgerError::DuplicateBarcode`] - A barcode is already in use.
    /// - [`LedgerError::DuplicateProduct`] - Product name is already taken.
    pub fn add_product(&self, new: NewProduct) -> Result<ProductId, LedgerError> {
        let name = new.name.trim().to_string();
        if name.is_empty() {
            return Err(LedgerError::EmptyName);
        }
        if new.variants.is_empty() {
            return Err(LedgerError::EmptyVariants);
        }
        let category = self.canonical_category(&new.category)?;

        let mut seen = HashSet::new();
        for variant in &new.variants {
            let key = lookup_key(&variant.name);
            if key.is_empty() {
                return Err(LedgerError::EmptyName);
            }
            if !seen.insert(key) {
                return Err(LedgerError::DuplicateVariant {
                    product: name.clone(),
                    variant: variant.name.trim().to_string(),
                });
            }
        }

        let product_id = ProductId(self.product_ids.next());
        let variants: Vec<Variant> = new
            .variants
            .into_iter()
            .map(|v| Variant {
                id: VariantId(self.variant_ids.next()),
                name: v.name.trim().to_string(),
                min_stock: v.min_stock,
                barcodes: v
                    .barcodes
                    .iter()
                    .map(|b| b.trim().to_string())
                    .filter(|b| !b.is_empty())
                    .collect(),
                stock: SharedStock::new(StockLevels::new(v.on_hand)),
            })
            .collect();

        let claims: Vec<(String, VariantId)> = variants
            .iter()
            .flat_map(|v| v.barcodes.iter().map(move |b| (b.clone(), v.id)))
            .collect();
        self.claim_barcodes(product_id, &claims)?;

        match self.names.entry(lookup_key(&name)) {
            Entry::Occupied(_) => {
                self.release_barcodes(claims.iter().map(|(code, _)| code));
                return Err(LedgerError::DuplicateProduct(name));
            }
            Entry::Vacant(entry) => {
                entry.insert(product_id);
            }
        }

        info!(product = %name, id = %product_id, variants = variants.len(), "product added");
        self.products.insert(
            product_id,
            Product {
                id: product_id,
                name,
                category,
                min_stock_global: new.min_stock_global,
                last_purchase_date: new.last_purchase_date,
                expiration_date: new.expiration_date,
                price_per_unit: new.price_per_unit,
                variants,
            },
        );
        Ok(product_id)
    }

    /// Adds a variant to an existing product.
    pub fn add_variant(
        &self,
        product_id: ProductId,
        new: NewVariant,
    ) -> Result<VariantId, LedgerError> {
        let name = new.name.trim().to_string();
        if name.is_empty() {
            return Err(LedgerError::EmptyName);
        }

        let mut product = self
            .products
            .get_mut(&product_id)
            .ok_or(LedgerError::ProductNotFound(product_id))?;
        if product.variant(&name).is_some() {
            return Err(LedgerError::DuplicateVariant {
                product: product.name.clone(),
                variant: name,
            });
        }

        let variant_id = VariantId(self.variant_ids.next());
        let barcodes: BTreeSet<String> = new
            .barcodes
            .iter()
            .map(|b| b.trim().to_string())
            .filter(|b| !b.is_empty())
            .collect();
        let claims: Vec<(String, VariantId)> =
            barcodes.iter().map(|b| (b.clone(), variant_id)).collect();
        self.claim_barcodes(product_id, &claims)?;

        info!(product = %product.name, variant = %name, "variant added");
        product.variants.push(Variant {
            id: variant_id,
            name,
            min_stock: new.min_stock,
            barcodes,
            stock: SharedStock::new(StockLevels::new(new.on_hand)),
        });
        Ok(variant_id)
    }

    /// Attaches a barcode to a variant.
    ///
    /// # Errors
    ///
    /// [`LedgerError::DuplicateBarcode`] if any variant already carries it.
    pub fn attach_barcode(
        &self,
        product_id: ProductId,
        variant_id: VariantId,
        code: &str,
    ) -> Result<(), LedgerError> {
        let code = code.trim().to_string();
        if code.is_empty() {
            return Err(LedgerError::EmptyName);
        }
        let mut product = self
            .products
            .get_mut(&product_id)
            .ok_or(LedgerError::ProductNotFound(product_id))?;
        let product_name = product.name.clone();
        let variant = product
            .variants
            .iter_mut()
            .find(|v| v.id == variant_id)
            .ok_or_else(|| LedgerError::UnknownCatalogReference {
                product: product_name,
                variant: Some(variant_id.to_string()),
            })?;
        self.claim_barcodes(product_id, &[(code.clone(), variant_id)])?;
        variant.barcodes.insert(code);
        Ok(())
    }

    /// Reserves every barcode or none of them.
    fn claim_barcodes(
        &self,
        product_id: ProductId,
        claims: &[(String, VariantId)],
    ) -> Result<(), LedgerError> {
        let mut claimed = Vec::with_capacity(claims.len());
        for (code, variant_id) in claims {
            match self.barcodes.entry(code.clone()) {
                Entry::Occupied(_) => {
                    self.release_barcodes(claimed.iter());
                    return Err(LedgerError::DuplicateBarcode(code.clone()));
                }
                Entry::Vacant(entry) => {
                    entry.insert((product_id, *variant_id));
                    claimed.push(code.clone());
                }
            }
        }
        Ok(())
    }

    fn release_barcodes<'a>(&self, codes: impl Iterator<Item = &'a String>) {
        for code in codes {
            self.barcodes.remove(code);
        }
    }

    /// Looks up a product ID by name, ignoring case and padding.
    pub fn product_id(&self, name: &str) -> Option<ProductId> {
        self.names.get(&lookup_key(name)).map(|id| *id)
    }

    pub fn product(&self, product_id: ProductId) -> Option<ProductSnapshot> {
        self.products.get(&product_id).map(|p| p.snapshot())
    }

    pub fn product_by_name(&self, name: &str) -> Option<ProductSnapshot> {
        self.product_id(name).and_then(|id| self.product(id))
    }

    /// Snapshots of every product, in creation order.
    pub fn products(&self) -> Vec<ProductSnapshot> {
        let mut products: Vec<ProductSnapshot> =
            self.products.iter().map(|p| p.snapshot()).collect();
        products.sort_by_key(|p| p.id);
        products
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    /// Resolves `(product, variant)` names to a stock handle.
    ///
    /// # Errors
    ///
    /// [`LedgerError::UnknownCatalogReference`] if either name is unknown.
    pub fn resolve(&self, product: &str, variant: &str) -> Result<StockHandle, LedgerError> {
        let unknown = || LedgerError::UnknownCatalogReference {
            product: product.trim().to_string(),
            variant: Some(variant.trim().to_string()),
        };
        let product_id = self.product_id(product).ok_or_else(unknown)?;
        let entry = self.products.get(&product_id).ok_or_else(unknown)?;
        let found = entry.variant(variant).ok_or_else(unknown)?;
        Ok(entry.handle(found))
    }

    /// Resolves a scanned barcode to its variant.
    pub fn find_by_barcode(&self, code: &str) -> Option<StockHandle> {
        let (product_id, variant_id) = *self.barcodes.get(code.trim())?;
        let product = self.products.get(&product_id)?;
        let variant = product.variants.iter().find(|v| v.id == variant_id)?;
        Some(product.handle(variant))
    }

    /// Edits a product's descriptive fields. Variant counters are untouched.
    pub fn update_product(
        &self,
        product_id: ProductId,
        update: ProductUpdate,
    ) -> Result<(), LedgerError> {
        let category = update
            .category
            .as_deref()
            .map(|c| self.canonical_category(c))
            .transpose()?;

        let mut product = self
            .products
            .get_mut(&product_id)
            .ok_or(LedgerError::ProductNotFound(product_id))?;

        if let Some(name) = update.name {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(LedgerError::EmptyName);
            }
            let old_key = lookup_key(&product.name);
            let new_key = lookup_key(&name);
            if old_key != new_key {
                match self.names.entry(new_key) {
                    Entry::Occupied(_) => return Err(LedgerError::DuplicateProduct(name)),
                    Entry::Vacant(entry) => {
                        entry.insert(product_id);
                    }
                }
                self.names.remove(&old_key);
            }
            info!(from = %product.name, to = %name, "product renamed");
            product.name = name;
        }
        if let Some(category) = category {
            product.category = category;
        }
        if let Some(min) = update.min_stock_global {
            product.min_stock_global = min;
        }
        if let Some(date) = update.last_purchase_date {
            product.last_purchase_date = date;
        }
        if let Some(date) = update.expiration_date {
            product.expiration_date = date;
        }
        if let Some(price) = update.price_per_unit {
            product.price_per_unit = price;
        }
        Ok(())
    }

    /// Removes a product and frees its name and barcodes.
    ///
    /// Register history referencing the product is kept; records carry
    /// their own name snapshot.
    pub fn delete_product(&self, product_id: ProductId) -> Result<ProductSnapshot, LedgerError> {
        let (_, product) = self
            .products
            .remove(&product_id)
            .ok_or(LedgerError::ProductNotFound(product_id))?;
        self.names.remove(&lookup_key(&product.name));
        for variant in &product.variants {
            self.release_barcodes(variant.barcodes.iter());
        }
        info!(product = %product.name, "product deleted");
        Ok(product.snapshot())
    }

    pub fn fallback_category(&self) -> &str {
        &self.fallback_category
    }

    pub fn categories(&self) -> Vec<String> {
        self.categories.read().clone()
    }

    /// Returns the stored spelling of a managed category tag.
    fn canonical_category(&self, name: &str) -> Result<String, LedgerError> {
        let key = lookup_key(name);
        self.categories
            .read()
            .iter()
            .find(|c| lookup_key(c) == key)
            .cloned()
            .ok_or_else(|| LedgerError::UnknownCategory(name.trim().to_string()))
    }

    pub fn add_category(&self, name: &str) -> Result<(), LedgerError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(LedgerError::EmptyName);
        }
        let mut categories = self.categories.write();
        if categories.iter().any(|c| lookup_key(c) == lookup_key(name)) {
            return Err(LedgerError::DuplicateCategory(name.to_string()));
        }
        categories.push(name.to_string());
        Ok(())
    }

    /// Renames a category tag and every product filed under it.
    ///
    /// Returns the number of products re-tagged.
    pub fn rename_category_tag(&self, old: &str, new: &str) -> Result<usize, LedgerError> {
        let new = new.trim();
        if new.is_empty() {
            return Err(LedgerError::EmptyName);
        }
        let mut categories = self.categories.write();
        let position = categories
            .iter()
            .position(|c| lookup_key(c) == lookup_key(old))
            .ok_or_else(|| LedgerError::UnknownCategory(old.trim().to_string()))?;
        if lookup_key(&categories[position]) == lookup_key(&self.fallback_category) {
            return Err(LedgerError::ProtectedCategory(categories[position].clone()));
        }
        if categories
            .iter()
            .enumerate()
            .any(|(i, c)| i != position && lookup_key(c) == lookup_key(new))
        {
            return Err(LedgerError::DuplicateCategory(new.to_string()));
        }

        let previous = std::mem::replace(&mut categories[position], new.to_string());
        let retagged = self.retag_products(&previous, new);
        info!(from = %previous, to = %new, products = retagged, "category renamed");
        Ok(retagged)
    }

    /// Deletes a category tag, moving its products to the fallback category.
    ///
    /// Returns the number of products reassigned.
    pub fn delete_category_tag(&self, name: &str) -> Result<usize, LedgerError> {
        let mut categories = self.categories.write();
        let position = categories
            .iter()
            .position(|c| lookup_key(c) == lookup_key(name))
            .ok_or_else(|| LedgerError::UnknownCategory(name.trim().to_string()))?;
        if lookup_key(&categories[position]) == lookup_key(&self.fallback_category) {
            return Err(LedgerError::ProtectedCategory(categories[position].clone()));
        }

        let removed = categories.remove(position);
        let fallback = self.fallback_category.clone();
        let retagged = self.retag_products(&removed, &fallback);
        info!(category = %removed, products = retagged, "category deleted");
        Ok(retagged)
    }

    fn retag_products(&self, from: &str, to: &str) -> usize {
        let mut retagged = 0;
        for mut product in self.products.iter_mut() {
            if product.category == from {
                product.category = to.to_string();
                retagged += 1;
            }
        }
        retagged
    }
}
