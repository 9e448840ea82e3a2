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

//! # PPE Ledger
//!
//! Stock-and-assignment ledger for personal protective equipment. It tracks
//! products by variant (size or model), moves units between on-hand and
//! in-transit, records equipment handed to employees and stock written off
//! as waste, and applies bulk submissions atomically.
//!
//! ## Core Components
//!
//! - [`Engine`]: Store object owning the catalog, ledger, register and directory
//! - [`StockLedger`]: Validated quantity movements addressed by name
//! - [`Register`]: Log of assignments and waste exits
//! - [`AssignmentPlan`] / [`StockBatch`]: Bulk submissions, all-or-nothing
//! - [`LedgerError`] / [`BulkReport`]: Error types for rejected requests
//!
//! ## Example
//!
//! ```
//! use chrono::NaiveDate;
//! use ppe_ledger::{Engine, NewProduct, NewVariant};
//! use rust_decimal_macros::dec;
//!
//! let engine = Engine::new();
//! engine
//!     .add_product(NewProduct {
//!         name: "Helmet".into(),
//!         category: "EPP".into(),
//!         variants: vec![NewVariant::new("Standard", 10, 2)],
//!         min_stock_global: 5,
//!         last_purchase_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
//!         expiration_date: None,
//!         price_per_unit: dec!(25.00),
//!     })
//!     .unwrap();
//!
//! // Two people receive two helmets each
//! let mut plan = engine.plan_assignment("helmet", ["Ana", "Luis"]).unwrap();
//! plan.set_quantity("Ana", 2);
//! plan.set_quantity("Luis", 2);
//! let date = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
//! let receipt = engine.commit_assignment(&plan, date).unwrap();
//!
//! assert_eq!(receipt.records.len(), 2);
//! assert_eq!(receipt.variants[0].on_hand, 6);
//! ```
//!
//! ## Thread Safety
//!
//! Each variant's counters sit behind their own mutex. Bulk commits lock
//! every variant they touch in ascending [`VariantId`] order, so overlapping
//! submissions serialize and disjoint ones run in parallel.

mod base;
pub mod bulk;
pub mod catalog;
pub mod config;
pub mod directory;
pub mod draft;
mod engine;
pub mod error;
pub mod journal;
pub mod ledger;
pub mod register;
pub mod report;
pub mod stock;

pub use base::{AssignmentId, EmployeeId, ProductId, VariantId};
pub use bulk::{
    AssignmentPlan, AssignmentRow, CommitReceipt, StockBatch, StockMode, StockRow, VariantLevels,
};
pub use catalog::{
    Catalog, NewProduct, NewVariant, ProductSnapshot, ProductUpdate, StockHandle, VariantRef,
    VariantSnapshot,
};
pub use config::LedgerConfig;
pub use directory::{Directory, Employee, NewEmployee};
pub use draft::{DraftRow, DraftStore, FileDraftStore, MemoryDraftStore, StockBatchDraft};
pub use engine::Engine;
pub use error::{BulkReport, LedgerError, RowFailure, StorageError};
pub use journal::{Journal, Movement, MovementKind, VariantFlow};
pub use ledger::StockLedger;
pub use register::{
    Assignment, AssignmentQuery, Recipient, Register, SortField, SortOrder, WASTE_EXIT_LABEL,
    renewal_date,
};
pub use report::{Dashboard, ExpiryStatus};
pub use stock::{SharedStock, StockLevels};
