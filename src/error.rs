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

//! Error types for ledger, catalog and bulk processing.

use crate::base::{AssignmentId, EmployeeId, ProductId};
use std::fmt;
use thiserror::Error;

/// Ledger and catalog errors.
///
/// Every variant describes a user-correctable input problem; none is fatal.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// A debit or transit move requested more than is on hand
    #[error("insufficient stock for {product} / {variant}: requested {requested}, available {available}")]
    InsufficientStock {
        product: String,
        variant: String,
        requested: u64,
        available: u32,
    },

    /// A transit return requested more than is in transit
    #[error("insufficient transit stock for {product} / {variant}: requested {requested}, in transit {available}")]
    InsufficientTransitStock {
        product: String,
        variant: String,
        requested: u64,
        available: u32,
    },

    /// A required per-row value is missing or non-positive
    #[error("incomplete submission: missing {field}")]
    ValidationIncomplete { field: &'static str },

    /// Product or variant name does not resolve in the catalog
    #[error("unknown catalog reference: {product}{}", variant_suffix(.variant))]
    UnknownCatalogReference {
        product: String,
        variant: Option<String>,
    },

    /// Quantity is zero
    #[error("invalid quantity (must be positive)")]
    InvalidQuantity,

    /// Quantity would exceed the counter's range
    #[error("quantity overflow")]
    QuantityOverflow,

    /// A name field is blank
    #[error("name must not be empty")]
    EmptyName,

    /// Product name is already taken
    #[error("product already exists: {0}")]
    DuplicateProduct(String),

    /// Variant name is already taken within the product
    #[error("variant {variant} already exists on {product}")]
    DuplicateVariant { product: String, variant: String },

    /// Barcode is already attached to another variant
    #[error("barcode already in use: {0}")]
    DuplicateBarcode(String),

    /// A product must carry at least one variant
    #[error("product must have at least one variant")]
    EmptyVariants,

    /// Category tag is not in the managed set
    #[error("unknown category: {0}")]
    UnknownCategory(String),

    /// Category tag already exists
    #[error("category already exists: {0}")]
    DuplicateCategory(String),

    /// The fallback category cannot be removed
    #[error("category {0} is protected")]
    ProtectedCategory(String),

    /// Product ID does not exist
    #[error("product not found: {0}")]
    ProductNotFound(ProductId),

    /// Register entry does not exist
    #[error("assignment record not found: {0}")]
    RecordNotFound(AssignmentId),

    /// Employee ID does not exist
    #[error("employee not found: {0}")]
    EmployeeNotFound(EmployeeId),

    /// Employee name is already taken
    #[error("employee already exists: {0}")]
    DuplicateEmployee(String),

    /// The same person appears on more than one row of a submission
    #[error("person listed more than once: {0}")]
    DuplicateRecipient(String),
}

fn variant_suffix(variant: &Option<String>) -> String {
    variant
        .as_deref()
        .map(|v| format!(" / {v}"))
        .unwrap_or_default()
}

/// One problem found while validating a bulk submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowFailure {
    /// Zero-based indices of the submitted rows the problem concerns.
    ///
    /// Aggregated stock shortfalls list every row drawing on the variant.
    /// Empty when the problem concerns the submission as a whole.
    pub rows: Vec<usize>,
    pub error: LedgerError,
}

impl fmt::Display for RowFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.rows.is_empty() {
            return write!(f, "{}", self.error);
        }
        let rows: Vec<String> = self.rows.iter().map(|r| r.to_string()).collect();
        write!(f, "row(s) {}: {}", rows.join(","), self.error)
    }
}

/// Rejection of a whole bulk submission.
///
/// Collects every row-level failure rather than stopping at the first, so
/// the caller can correct all problems in one pass. A rejected submission
/// has applied nothing.
#[derive(Error, Debug, Clone, PartialEq, Eq, Default)]
#[error("bulk submission rejected with {} problem(s)", .failures.len())]
pub struct BulkReport {
    pub failures: Vec<RowFailure>,
}

impl BulkReport {
    pub fn push(&mut self, rows: Vec<usize>, error: LedgerError) {
        self.failures.push(RowFailure { rows, error });
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    /// Converts an empty report into `Ok`.
    pub fn into_result(self) -> Result<(), BulkReport> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

/// Failures reading or writing side-channel files (drafts, configuration).
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("storage failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid JSON document: {0}")]
    Format(#[from] serde_json::Error),
}
