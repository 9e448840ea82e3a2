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

//! Ledger engine.
//!
//! The engine is the explicit store object: constructed once at start-up,
//! shared by reference, and owning the stock ledger, the assignment
//! register and the employee directory. Bulk operations live in
//! [`crate::bulk`] as further `impl Engine` blocks.
//!
//! # Lock order
//!
//! Variant counters (ascending [`VariantId`](crate::VariantId)) → register →
//! directory. Every path that takes more than one of these takes them in
//! this order.

use crate::base::{AssignmentId, EmployeeId, ProductId};
use crate::catalog::{Catalog, NewProduct, ProductSnapshot};
use crate::config::LedgerConfig;
use crate::directory::{Directory, Employee, NewEmployee};
use crate::error::LedgerError;
use crate::journal::Journal;
use crate::ledger::StockLedger;
use crate::register::{Assignment, AssignmentQuery, Register};
use tracing::info;

/// Stock-and-assignment engine.
///
/// # Invariants
///
/// - No variant's on-hand or in-transit count is ever negative.
/// - Register entries exist only for stock that was actually debited.
/// - Deleting a register entry never changes stock.
/// - A bulk submission is applied entirely or not at all.
#[derive(Debug)]
pub struct Engine {
    ledger: StockLedger,
    register: Register,
    directory: Directory,
}

impl Engine {
    /// Creates an engine with the default configuration.
    pub fn new() -> Self {
        Self::with_config(LedgerConfig::default())
    }

    pub fn with_config(config: LedgerConfig) -> Self {
        Engine {
            ledger: StockLedger::new(config),
            register: Register::new(),
            directory: Directory::new(),
        }
    }

    pub fn ledger(&self) -> &StockLedger {
        &self.ledger
    }

    pub fn catalog(&self) -> &Catalog {
        self.ledger.catalog()
    }

    pub fn register(&self) -> &Register {
        &self.register
    }

    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    pub fn journal(&self) -> &Journal {
        self.ledger.journal()
    }

    pub fn config(&self) -> &LedgerConfig {
        self.ledger.config()
    }

    /// Adds a product with its opening stock.
    pub fn add_product(&self, new: NewProduct) -> Result<ProductId, LedgerError> {
        self.ledger.add_product(new)
    }

    /// Snapshots of every product, in creation order.
    pub fn products(&self) -> Vec<ProductSnapshot> {
        self.catalog().products()
    }

    pub fn product_by_name(&self, name: &str) -> Option<ProductSnapshot> {
        self.catalog().product_by_name(name)
    }

    /// Register entries, in insertion order.
    pub fn assignments(&self) -> Vec<Assignment> {
        self.register.all()
    }

    pub fn query_assignments(&self, query: &AssignmentQuery) -> Vec<Assignment> {
        self.register.query(query)
    }

    /// Removes a register entry without crediting stock back.
    pub fn delete_assignment(&self, id: AssignmentId) -> Result<Assignment, LedgerError> {
        self.register.delete_record(id)
    }

    pub fn add_employee(&self, new: NewEmployee) -> Result<EmployeeId, LedgerError> {
        self.directory.add_employee(new)
    }

    /// Replaces an employee's fields.
    ///
    /// A name change rewrites every register entry attributed to the old
    /// name. The register stays locked across both steps, so no commit can
    /// record under the old name in between. Returns the number of entries
    /// rewritten.
    pub fn update_employee(
        &self,
        id: EmployeeId,
        update: NewEmployee,
    ) -> Result<usize, LedgerError> {
        let mut register = self.register.writer();
        let previous = self.directory.replace(id, update)?;
        let current = self
            .directory
            .get(id)
            .ok_or(LedgerError::EmployeeNotFound(id))?;
        if previous.name == current.name {
            return Ok(0);
        }
        info!(from = %previous.name, to = %current.name, "employee renamed");
        Ok(register.rename(&previous.name, &current.name))
    }

    /// Removes an employee. Their register history is retained.
    pub fn delete_employee(&self, id: EmployeeId) -> Result<Employee, LedgerError> {
        let removed = self.directory.delete_employee(id)?;
        info!(employee = %removed.name, "employee deleted");
        Ok(removed)
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}
