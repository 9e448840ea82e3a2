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

//! Bulk operation engine.
//!
//! Two kinds of submission, both validate-all-then-apply-all:
//!
//! - **Bulk assignment**: one product handed to several people, planned in
//!   two phases ([`Engine::plan_assignment`], then per-person details on the
//!   [`AssignmentPlan`]) and committed with [`Engine::commit_assignment`].
//! - **Stock batch**: rows of `(product, variant, quantity)` under one
//!   [`StockMode`], committed with [`Engine::commit_stock_batch`].
//!
//! Rows drawing on the same variant are summed before checking stock, so a
//! submission can never oversell a variant even when each row alone would
//! fit. A commit locks every touched variant in ascending ID order, checks
//! the aggregate demand against the locked counters, and writes only if
//! every check passed. Any failure rejects the whole submission with a
//! [`BulkReport`] listing every problem found.

use crate::base::{AssignmentId, VariantId, lookup_key};
use crate::catalog::{StockHandle, VariantRef};
use crate::engine::Engine;
use crate::error::{BulkReport, LedgerError};
use crate::journal::MovementKind;
use crate::ledger::StockLedger;
use crate::register::{Recipient, RegisterWriter};
use crate::stock::StockLevels;
use chrono::NaiveDate;
use parking_lot::MutexGuard;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};

/// One person's line in a bulk assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentRow {
    pub person: String,
    /// Chosen variant; must be set before the plan can commit.
    pub variant: Option<String>,
    pub quantity: u32,
    pub renewal_months: Option<u32>,
}

/// Bulk assignment of one product to several people.
///
/// Built by [`Engine::plan_assignment`]. When the product has a single
/// variant it is preselected on every row; otherwise each row needs an
/// explicit choice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentPlan {
    product: String,
    variants: Vec<String>,
    rows: Vec<AssignmentRow>,
}

impl AssignmentPlan {
    /// Product name as stored in the catalog.
    pub fn product(&self) -> &str {
        &self.product
    }

    /// Variant names available when the plan was made.
    pub fn variants(&self) -> &[String] {
        &self.variants
    }

    pub fn rows(&self) -> &[AssignmentRow] {
        &self.rows
    }

    pub fn needs_variant_selection(&self) -> bool {
        self.variants.len() > 1
    }

    /// The row of a selected person, for editing.
    pub fn row_mut(&mut self, person: &str) -> Option<&mut AssignmentRow> {
        self.rows.iter_mut().find(|r| r.person == person)
    }

    /// Selects the variant for a person. Returns `false` if the person is
    /// not part of the plan.
    pub fn set_variant(&mut self, person: &str, variant: &str) -> bool {
        self.row_mut(person)
            .map(|row| row.variant = Some(variant.to_string()))
            .is_some()
    }

    pub fn set_quantity(&mut self, person: &str, quantity: u32) -> bool {
        self.row_mut(person)
            .map(|row| row.quantity = quantity)
            .is_some()
    }

    pub fn set_renewal(&mut self, person: &str, months: Option<u32>) -> bool {
        self.row_mut(person)
            .map(|row| row.renewal_months = months)
            .is_some()
    }

    /// True once every row has a variant and a positive quantity.
    pub fn is_complete(&self) -> bool {
        self.rows.iter().all(|r| {
            r.variant.as_deref().is_some_and(|v| !v.trim().is_empty()) && r.quantity > 0
        })
    }
}

/// Direction of a stock batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockMode {
    /// Receive units; unknown products and variants are provisioned.
    Entry,
    /// Remove units as waste; each row is logged in the register.
    Exit,
    TransitOut,
    TransitReturn,
}

impl StockMode {
    fn movement(self) -> MovementKind {
        match self {
            StockMode::Entry => MovementKind::Entry,
            StockMode::Exit => MovementKind::Exit,
            StockMode::TransitOut => MovementKind::TransitOut,
            StockMode::TransitReturn => MovementKind::TransitReturn,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockRow {
    pub product: String,
    pub variant: String,
    pub quantity: u32,
}

impl StockRow {
    pub fn new(product: impl Into<String>, variant: impl Into<String>, quantity: u32) -> Self {
        Self {
            product: product.into(),
            variant: variant.into(),
            quantity,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockBatch {
    pub mode: StockMode,
    pub date: NaiveDate,
    pub rows: Vec<StockRow>,
}

/// Counters of one variant right after a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VariantLevels {
    pub target: VariantRef,
    pub on_hand: u32,
    pub in_transit: u32,
}

/// Result of a successful bulk commit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommitReceipt {
    /// Register entries created, in row order.
    pub records: Vec<AssignmentId>,
    /// Every touched variant, in ascending variant ID order.
    pub variants: Vec<VariantLevels>,
}

/// Aggregate demand on one variant.
#[derive(Debug)]
struct Demand {
    handle: StockHandle,
    rows: Vec<usize>,
    quantity: u64,
}

type Demands = BTreeMap<VariantId, Demand>;

fn add_demand(demands: &mut Demands, handle: StockHandle, row: usize, quantity: u32) {
    let demand = demands
        .entry(handle.target.variant_id)
        .or_insert_with(|| Demand {
            handle,
            rows: Vec::new(),
            quantity: 0,
        });
    demand.rows.push(row);
    demand.quantity += u64::from(quantity);
}

/// Demands with their counters locked, in ascending variant ID order.
struct Locked<'a> {
    entries: Vec<(&'a Demand, MutexGuard<'a, StockLevels>)>,
}

impl<'a> Locked<'a> {
    fn acquire(demands: &'a Demands) -> Self {
        // BTreeMap iteration is ordered by VariantId: the global lock order.
        Self {
            entries: demands
                .values()
                .map(|demand| (demand, demand.handle.stock().lock()))
                .collect(),
        }
    }

    /// Stages every aggregate movement against the locked counters.
    ///
    /// Staged counters are returned in lock order when all succeed.
    fn stage(&self, kind: MovementKind, report: &mut BulkReport) -> Vec<StockLevels> {
        let mut staged = Vec::with_capacity(self.entries.len());
        for (demand, levels) in &self.entries {
            let target = &demand.handle.target;
            let result = match u32::try_from(demand.quantity) {
                Ok(quantity) => StockLedger::stage(target, **levels, kind, quantity),
                Err(_) => Err(oversized(target, **levels, kind, demand.quantity)),
            };
            match result {
                Ok(next) => staged.push(next),
                Err(error) => report.push(demand.rows.clone(), error),
            }
        }
        staged
    }

    fn write(
        &mut self,
        ledger: &StockLedger,
        kind: MovementKind,
        staged: Vec<StockLevels>,
    ) -> Vec<VariantLevels> {
        self.entries
            .iter_mut()
            .zip(staged)
            .map(|((demand, levels), next)| {
                let target = &demand.handle.target;
                // Aggregates were range-checked while staging.
                let quantity = demand.quantity as u32;
                ledger.write_staged(target, levels, next, kind, quantity);
                VariantLevels {
                    target: target.clone(),
                    on_hand: levels.on_hand(),
                    in_transit: levels.in_transit(),
                }
            })
            .collect()
    }
}

/// Error for an aggregate that does not fit a counter at all.
fn oversized(
    target: &VariantRef,
    levels: StockLevels,
    kind: MovementKind,
    requested: u64,
) -> LedgerError {
    match kind {
        MovementKind::Entry => LedgerError::QuantityOverflow,
        MovementKind::TransitReturn => LedgerError::InsufficientTransitStock {
            product: target.product.clone(),
            variant: target.variant.clone(),
            requested,
            available: levels.in_transit(),
        },
        MovementKind::Exit | MovementKind::Assignment | MovementKind::TransitOut => {
            LedgerError::InsufficientStock {
                product: target.product.clone(),
                variant: target.variant.clone(),
                requested,
                available: levels.on_hand(),
            }
        }
    }
}

impl Engine {
    /// Starts a bulk assignment of one product to the given people.
    ///
    /// Blank and repeated names are dropped. Rows start with quantity 1 and
    /// no renewal; the variant is preselected only if the product has
    /// exactly one.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::ValidationIncomplete`] - No person selected.
    /// - [`LedgerError::UnknownCatalogReference`] - Product not in the catalog.
    pub fn plan_assignment<I, S>(
        &self,
        product: &str,
        people: I,
    ) -> Result<AssignmentPlan, LedgerError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let snapshot = self.catalog().product_by_name(product).ok_or_else(|| {
            LedgerError::UnknownCatalogReference {
                product: product.trim().to_string(),
                variant: None,
            }
        })?;
        let variants: Vec<String> = snapshot.variants.iter().map(|v| v.name.clone()).collect();
        let preselected = match variants.as_slice() {
            [only] => Some(only.clone()),
            _ => None,
        };

        let mut rows: Vec<AssignmentRow> = Vec::new();
        for person in people {
            let person = person.as_ref().trim();
            if person.is_empty() || rows.iter().any(|r| r.person == person) {
                continue;
            }
            rows.push(AssignmentRow {
                person: person.to_string(),
                variant: preselected.clone(),
                quantity: 1,
                renewal_months: None,
            });
        }
        if rows.is_empty() {
            return Err(LedgerError::ValidationIncomplete { field: "person" });
        }

        Ok(AssignmentPlan {
            product: snapshot.name,
            variants,
            rows,
        })
    }

    /// Resolves plan rows into per-variant demand, reporting incomplete rows.
    fn assignment_demands(&self, plan: &AssignmentPlan, report: &mut BulkReport) -> Demands {
        let mut demands = Demands::new();
        for (index, row) in plan.rows.iter().enumerate() {
            let variant = match row.variant.as_deref() {
                Some(v) if !v.trim().is_empty() => v,
                _ => {
                    report.push(
                        vec![index],
                        LedgerError::ValidationIncomplete { field: "variant" },
                    );
                    continue;
                }
            };
            if row.quantity == 0 {
                report.push(
                    vec![index],
                    LedgerError::ValidationIncomplete { field: "quantity" },
                );
                continue;
            }
            match self.catalog().resolve(&plan.product, variant) {
                Ok(handle) => add_demand(&mut demands, handle, index, row.quantity),
                Err(error) => report.push(vec![index], error),
            }
        }
        demands
    }

    /// Runs commit validation for a plan without changing anything.
    pub fn validate_assignment(&self, plan: &AssignmentPlan) -> Result<(), BulkReport> {
        let mut report = BulkReport::default();
        let demands = self.assignment_demands(plan, &mut report);
        let locked = Locked::acquire(&demands);
        locked.stage(MovementKind::Assignment, &mut report);
        report.into_result()
    }

    /// Commits a bulk assignment dated `date`.
    ///
    /// Each variant is debited once by the sum of the rows drawing on it;
    /// one register entry is recorded per row.
    pub fn commit_assignment(
        &self,
        plan: &AssignmentPlan,
        date: NaiveDate,
    ) -> Result<CommitReceipt, BulkReport> {
        let mut report = BulkReport::default();
        let demands = self.assignment_demands(plan, &mut report);

        let mut locked = Locked::acquire(&demands);
        let mut register = self.register().writer();
        let staged = locked.stage(MovementKind::Assignment, &mut report);
        if let Err(report) = report.into_result() {
            warn!(
                product = %plan.product,
                problems = report.failures.len(),
                "bulk assignment rejected"
            );
            return Err(report);
        }

        let variants = locked.write(self.ledger(), MovementKind::Assignment, staged);
        let records = record_rows(&mut register, &demands, date, |index| {
            let row = &plan.rows[index];
            (
                Recipient::Person(row.person.clone()),
                row.quantity,
                row.renewal_months,
            )
        });

        info!(
            product = %plan.product,
            people = plan.rows.len(),
            variants = variants.len(),
            "bulk assignment committed"
        );
        Ok(CommitReceipt { records, variants })
    }

    /// Single-person assignment, committed like a one-row bulk assignment.
    pub fn assign(
        &self,
        person: &str,
        product: &str,
        variant: &str,
        quantity: u32,
        date: NaiveDate,
        renewal_months: Option<u32>,
    ) -> Result<CommitReceipt, BulkReport> {
        let mut plan = self
            .plan_assignment(product, [person])
            .map_err(single_failure)?;
        let person = plan.rows[0].person.clone();
        plan.set_variant(&person, variant);
        plan.set_quantity(&person, quantity);
        plan.set_renewal(&person, renewal_months);
        self.commit_assignment(&plan, date)
    }

    /// Resolves batch rows into per-variant demand.
    ///
    /// With `provision` set, entry rows naming unknown products or variants
    /// create them; otherwise such rows are accepted without demand.
    fn batch_demands(
        &self,
        batch: &StockBatch,
        provision: bool,
        report: &mut BulkReport,
    ) -> Demands {
        let entry = batch.mode == StockMode::Entry;
        if batch.rows.is_empty() {
            report.push(Vec::new(), LedgerError::ValidationIncomplete { field: "rows" });
        }

        let mut shaped = Vec::with_capacity(batch.rows.len());
        for (index, row) in batch.rows.iter().enumerate() {
            if row.product.trim().is_empty() {
                report.push(
                    vec![index],
                    LedgerError::ValidationIncomplete { field: "product" },
                );
                continue;
            }
            if row.quantity == 0 {
                report.push(
                    vec![index],
                    LedgerError::ValidationIncomplete { field: "quantity" },
                );
                continue;
            }
            let new_product = self.catalog().product_id(&row.product).is_none();
            if row.variant.trim().is_empty() && !(entry && new_product) {
                report.push(
                    vec![index],
                    LedgerError::ValidationIncomplete { field: "variant" },
                );
                continue;
            }
            shaped.push((index, row));
        }

        let mut demands = Demands::new();
        let mut unknown: BTreeMap<(String, String), (Vec<usize>, u64)> = BTreeMap::new();
        if entry && provision && !report.is_empty() {
            // Nothing is provisioned for a submission that will be rejected.
            return demands;
        }
        for (index, row) in shaped {
            let variant = if row.variant.trim().is_empty() {
                self.config().default_variant_name.as_str()
            } else {
                row.variant.as_str()
            };
            let resolved = if entry && provision {
                self.ledger()
                    .resolve_or_provision(&row.product, variant, batch.date)
            } else {
                self.catalog().resolve(&row.product, variant)
            };
            match resolved {
                Ok(handle) => add_demand(&mut demands, handle, index, row.quantity),
                Err(LedgerError::UnknownCatalogReference { .. }) if entry && !provision => {
                    let pending = unknown
                        .entry((lookup_key(&row.product), lookup_key(variant)))
                        .or_default();
                    pending.0.push(index);
                    pending.1 += u64::from(row.quantity);
                }
                Err(error) => report.push(vec![index], error),
            }
        }
        // Variants still to be provisioned start from zero stock.
        for (rows, quantity) in unknown.into_values() {
            if quantity > u64::from(u32::MAX) {
                report.push(rows, LedgerError::QuantityOverflow);
            }
        }
        demands
    }

    /// Runs commit validation for a batch without changing anything.
    ///
    /// Entry rows that would provision a product or variant are accepted.
    pub fn validate_stock_batch(&self, batch: &StockBatch) -> Result<(), BulkReport> {
        let mut report = BulkReport::default();
        let demands = self.batch_demands(batch, false, &mut report);
        let locked = Locked::acquire(&demands);
        locked.stage(batch.mode.movement(), &mut report);
        report.into_result()
    }

    /// Commits a stock batch.
    ///
    /// Entry batches provision unknown products and variants (with zero
    /// stock) once the rows are complete, then credit them. Exit batches
    /// also log one waste entry per row in the register.
    pub fn commit_stock_batch(&self, batch: &StockBatch) -> Result<CommitReceipt, BulkReport> {
        let kind = batch.mode.movement();
        if batch.mode == StockMode::Entry {
            // Provisioning is not undone, so an entry batch must pass the dry run first.
            if let Err(report) = self.validate_stock_batch(batch) {
                warn!(
                    mode = ?batch.mode,
                    problems = report.failures.len(),
                    "stock batch rejected"
                );
                return Err(report);
            }
        }
        let mut report = BulkReport::default();
        let demands = self.batch_demands(batch, true, &mut report);

        let mut locked = Locked::acquire(&demands);
        let mut register = (batch.mode == StockMode::Exit).then(|| self.register().writer());
        let staged = locked.stage(kind, &mut report);
        if let Err(report) = report.into_result() {
            warn!(mode = ?batch.mode, problems = report.failures.len(), "stock batch rejected");
            return Err(report);
        }

        let variants = locked.write(self.ledger(), kind, staged);
        let records = match register.as_mut() {
            Some(register) => record_rows(register, &demands, batch.date, |index| {
                (Recipient::WasteExit, batch.rows[index].quantity, None)
            }),
            None => Vec::new(),
        };

        info!(
            mode = ?batch.mode,
            rows = batch.rows.len(),
            variants = variants.len(),
            "stock batch committed"
        );
        Ok(CommitReceipt { records, variants })
    }

    /// Logs a single waste exit, committed like a one-row exit batch.
    pub fn record_waste(
        &self,
        product: &str,
        variant: &str,
        quantity: u32,
        date: NaiveDate,
    ) -> Result<CommitReceipt, BulkReport> {
        self.commit_stock_batch(&StockBatch {
            mode: StockMode::Exit,
            date,
            rows: vec![StockRow::new(product, variant, quantity)],
        })
    }
}

/// Appends one register entry per row, in row order.
fn record_rows<F>(
    register: &mut RegisterWriter<'_>,
    demands: &Demands,
    date: NaiveDate,
    row: F,
) -> Vec<AssignmentId>
where
    F: Fn(usize) -> (Recipient, u32, Option<u32>),
{
    let mut targets: Vec<(usize, &VariantRef)> = demands
        .values()
        .flat_map(|d| d.rows.iter().map(move |&index| (index, &d.handle.target)))
        .collect();
    targets.sort_by_key(|(index, _)| *index);

    targets
        .into_iter()
        .map(|(index, target)| {
            let (recipient, quantity, renewal) = row(index);
            register.append(recipient, target, quantity, date, renewal)
        })
        .collect()
}

fn single_failure(error: LedgerError) -> BulkReport {
    let mut report = BulkReport::default();
    report.push(vec![0], error);
    report
}
