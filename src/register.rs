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

//! Assignment register: the log of equipment handed out and of waste exits.
//!
//! Entries are created only after the ledger has debited the stock they
//! describe. The register never touches stock itself: deleting an entry is
//! a log correction, not an inventory reversal.

use crate::base::{AssignmentId, IdSequence, ProductId, VariantId};
use crate::catalog::VariantRef;
use crate::error::LedgerError;
use chrono::{Datelike, Months, NaiveDate};
use parking_lot::{RwLock, RwLockWriteGuard};
use serde::Serialize;
use std::cmp::Ordering;
use tracing::info;

/// Display label of waste entries.
pub const WASTE_EXIT_LABEL: &str = "MERMA / SALIDA";

/// Who received the units of a register entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum Recipient {
    /// Handed to a person, joined to the directory by name.
    Person(String),
    /// Removed from stock (breakage, loss).
    WasteExit,
}

impl Recipient {
    /// Name shown in listings; waste entries show [`WASTE_EXIT_LABEL`].
    pub fn label(&self) -> &str {
        match self {
            Recipient::Person(name) => name,
            Recipient::WasteExit => WASTE_EXIT_LABEL,
        }
    }

    pub fn person(&self) -> Option<&str> {
        match self {
            Recipient::Person(name) => Some(name),
            Recipient::WasteExit => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Assignment {
    pub id: AssignmentId,
    pub recipient: Recipient,
    pub product_id: ProductId,
    pub variant_id: VariantId,
    /// Product name when the entry was recorded.
    pub equipment: String,
    /// Variant name when the entry was recorded.
    pub category: String,
    pub assignment_date: NaiveDate,
    pub quantity: u32,
    pub renewal_date: Option<NaiveDate>,
}

/// Adds a renewal period to an assignment date.
///
/// Calendar-month arithmetic; a day that does not exist in the target month
/// is clamped to its last day, so `2025-01-31 + 1` is `2025-02-28`. Zero or
/// absent periods yield no renewal date.
pub fn renewal_date(date: NaiveDate, months: Option<u32>) -> Option<NaiveDate> {
    match months {
        Some(m) if m > 0 => date.checked_add_months(Months::new(m)),
        _ => None,
    }
}

/// Field to sort register listings by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    Person,
    Equipment,
    Category,
    Date,
    Quantity,
    Renewal,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

/// Register listing filter.
///
/// `person` filters by exact name and takes precedence over `search`, which
/// matches person or equipment as a case-insensitive substring.
#[derive(Debug, Clone, Default)]
pub struct AssignmentQuery {
    pub person: Option<String>,
    pub search: Option<String>,
    pub sort: Option<(SortField, SortOrder)>,
}

impl AssignmentQuery {
    fn matches(&self, entry: &Assignment) -> bool {
        if let Some(person) = &self.person {
            return entry.recipient.person() == Some(person.as_str());
        }
        match &self.search {
            Some(term) if !term.trim().is_empty() => {
                let term = term.trim().to_lowercase();
                entry.recipient.label().to_lowercase().contains(&term)
                    || entry.equipment.to_lowercase().contains(&term)
            }
            _ => true,
        }
    }
}

fn compare(a: &Assignment, b: &Assignment, field: SortField) -> Ordering {
    match field {
        SortField::Person => a.recipient.label().cmp(b.recipient.label()),
        SortField::Equipment => a.equipment.cmp(&b.equipment),
        SortField::Category => a.category.cmp(&b.category),
        SortField::Date => a.assignment_date.cmp(&b.assignment_date),
        SortField::Quantity => a.quantity.cmp(&b.quantity),
        SortField::Renewal => a.renewal_date.cmp(&b.renewal_date),
    }
}

/// Exclusive access to the register for the duration of a commit.
///
/// Holding a writer keeps deletes and renames out until the commit ends.
pub(crate) struct RegisterWriter<'a> {
    records: RwLockWriteGuard<'a, Vec<Assignment>>,
    ids: &'a IdSequence,
}

impl RegisterWriter<'_> {
    pub(crate) fn append(
        &mut self,
        recipient: Recipient,
        target: &VariantRef,
        quantity: u32,
        date: NaiveDate,
        renewal_months: Option<u32>,
    ) -> AssignmentId {
        let id = AssignmentId(self.ids.next());
        self.records.push(Assignment {
            id,
            recipient,
            product_id: target.product_id,
            variant_id: target.variant_id,
            equipment: target.product.clone(),
            category: target.variant.clone(),
            assignment_date: date,
            quantity,
            renewal_date: renewal_date(date, renewal_months),
        });
        id
    }

    pub(crate) fn rename(&mut self, old: &str, new: &str) -> usize {
        let mut renamed = 0;
        for record in self.records.iter_mut() {
            if let Recipient::Person(name) = &mut record.recipient {
                if name == old {
                    *name = new.to_string();
                    renamed += 1;
                }
            }
        }
        if renamed > 0 {
            info!(from = %old, to = %new, entries = renamed, "register actor renamed");
        }
        renamed
    }
}

/// Insertion-ordered log of register entries.
#[derive(Debug, Default)]
pub struct Register {
    records: RwLock<Vec<Assignment>>,
    ids: IdSequence,
}

impl Register {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn writer(&self) -> RegisterWriter<'_> {
        RegisterWriter {
            records: self.records.write(),
            ids: &self.ids,
        }
    }

    /// Appends an entry for units handed to a person.
    ///
    /// The caller must already have debited the stock.
    pub fn record_assignment(
        &self,
        person: &str,
        target: &VariantRef,
        quantity: u32,
        date: NaiveDate,
        renewal_months: Option<u32>,
    ) -> AssignmentId {
        self.writer().append(
            Recipient::Person(person.to_string()),
            target,
            quantity,
            date,
            renewal_months,
        )
    }

    /// Appends a waste entry. The caller must already have debited the stock.
    pub fn record_exit(&self, target: &VariantRef, quantity: u32, date: NaiveDate) -> AssignmentId {
        self.writer()
            .append(Recipient::WasteExit, target, quantity, date, None)
    }

    /// Removes an entry. Stock is not credited back.
    pub fn delete_record(&self, id: AssignmentId) -> Result<Assignment, LedgerError> {
        let mut records = self.records.write();
        let position = records
            .iter()
            .position(|r| r.id == id)
            .ok_or(LedgerError::RecordNotFound(id))?;
        let removed = records.remove(position);
        info!(id = %id, recipient = %removed.recipient.label(), "register entry deleted");
        Ok(removed)
    }

    /// Rewrites the person name on every entry attributed to `old`.
    ///
    /// Matching is exact. Returns the number of entries rewritten.
    pub fn rename_actor(&self, old: &str, new: &str) -> usize {
        self.writer().rename(old, new)
    }

    pub fn get(&self, id: AssignmentId) -> Option<Assignment> {
        self.records.read().iter().find(|r| r.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Every entry, in insertion order.
    pub fn all(&self) -> Vec<Assignment> {
        self.records.read().clone()
    }

    /// Filters and sorts entries.
    ///
    /// Sorting is stable: ties keep insertion order in both directions.
    pub fn query(&self, query: &AssignmentQuery) -> Vec<Assignment> {
        let mut entries: Vec<Assignment> = self
            .records
            .read()
            .iter()
            .filter(|r| query.matches(r))
            .cloned()
            .collect();
        if let Some((field, order)) = query.sort {
            entries.sort_by(|a, b| match order {
                SortOrder::Ascending => compare(a, b, field),
                SortOrder::Descending => compare(b, a, field),
            });
        }
        entries
    }

    /// Number of entries attributed to a person.
    pub fn count_for_person(&self, person: &str) -> usize {
        self.records
            .read()
            .iter()
            .filter(|r| r.recipient.person() == Some(person))
            .count()
    }

    /// Entries referencing a product, in insertion order.
    pub fn for_product(&self, product_id: ProductId) -> Vec<Assignment> {
        self.records
            .read()
            .iter()
            .filter(|r| r.product_id == product_id)
            .cloned()
            .collect()
    }

    /// Person entries whose renewal date falls on or before `date`, soonest first.
    pub fn renewals_due(&self, date: NaiveDate) -> Vec<Assignment> {
        let mut due: Vec<Assignment> = self
            .records
            .read()
            .iter()
            .filter(|r| r.renewal_date.is_some_and(|d| d <= date))
            .cloned()
            .collect();
        due.sort_by_key(|r| r.renewal_date);
        due
    }

    /// Units handed to people per calendar month of `year` (January first).
    pub fn units_assigned_by_month(&self, year: i32) -> [u64; 12] {
        let mut months = [0u64; 12];
        for entry in self.records.read().iter() {
            if entry.recipient.person().is_some() && entry.assignment_date.year() == year {
                months[entry.assignment_date.month0() as usize] += u64::from(entry.quantity);
            }
        }
        months
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn helmet() -> VariantRef {
        VariantRef {
            product_id: ProductId(1),
            variant_id: VariantId(1),
            product: "Casco Blanco".into(),
            variant: "Ajustable".into(),
        }
    }

    fn gloves() -> VariantRef {
        VariantRef {
            product_id: ProductId(2),
            variant_id: VariantId(2),
            product: "Guantes Cabritilla".into(),
            variant: "Único".into(),
        }
    }

    #[test]
    fn renewal_clamps_to_end_of_month() {
        assert_eq!(
            renewal_date(date(2025, 1, 31), Some(1)),
            Some(date(2025, 2, 28))
        );
        assert_eq!(
            renewal_date(date(2024, 1, 31), Some(1)),
            Some(date(2024, 2, 29))
        );
        assert_eq!(
            renewal_date(date(2025, 11, 15), Some(3)),
            Some(date(2026, 2, 15))
        );
        assert_eq!(renewal_date(date(2025, 1, 31), Some(0)), None);
        assert_eq!(renewal_date(date(2025, 1, 31), None), None);
    }

    #[test]
    fn record_assignment_computes_renewal() {
        let register = Register::new();
        let id = register.record_assignment("Ana Pérez", &helmet(), 1, date(2025, 1, 31), Some(1));
        let entry = register.get(id).unwrap();
        assert_eq!(entry.recipient, Recipient::Person("Ana Pérez".into()));
        assert_eq!(entry.equipment, "Casco Blanco");
        assert_eq!(entry.renewal_date, Some(date(2025, 2, 28)));
    }

    #[test]
    fn exit_uses_waste_recipient() {
        let register = Register::new();
        let id = register.record_exit(&gloves(), 3, date(2025, 6, 1));
        let entry = register.get(id).unwrap();
        assert_eq!(entry.recipient, Recipient::WasteExit);
        assert_eq!(entry.recipient.label(), "MERMA / SALIDA");
        assert_eq!(entry.renewal_date, None);
    }

    #[test]
    fn delete_unknown_record_fails() {
        let register = Register::new();
        let id = register.record_exit(&gloves(), 3, date(2025, 6, 1));
        register.delete_record(id).unwrap();
        assert_eq!(
            register.delete_record(id),
            Err(LedgerError::RecordNotFound(id))
        );
        assert!(register.is_empty());
    }

    #[test]
    fn rename_touches_only_exact_matches() {
        let register = Register::new();
        register.record_assignment("Ana", &helmet(), 1, date(2025, 1, 1), None);
        register.record_assignment("Ana María", &helmet(), 1, date(2025, 1, 1), None);
        register.record_assignment("Ana", &gloves(), 2, date(2025, 1, 2), None);
        register.record_exit(&gloves(), 1, date(2025, 1, 3));

        assert_eq!(register.rename_actor("Ana", "Ana Soto"), 2);
        assert_eq!(register.count_for_person("Ana Soto"), 2);
        assert_eq!(register.count_for_person("Ana María"), 1);
        assert_eq!(register.count_for_person("Ana"), 0);
    }

    #[test]
    fn person_filter_is_exact_and_search_is_fuzzy() {
        let register = Register::new();
        register.record_assignment("Luis", &helmet(), 1, date(2025, 1, 1), None);
        register.record_assignment("Luisa", &gloves(), 1, date(2025, 1, 1), None);
        register.record_exit(&gloves(), 1, date(2025, 1, 3));

        let exact = register.query(&AssignmentQuery {
            person: Some("Luis".into()),
            ..Default::default()
        });
        assert_eq!(exact.len(), 1);

        let fuzzy = register.query(&AssignmentQuery {
            search: Some("luis".into()),
            ..Default::default()
        });
        assert_eq!(fuzzy.len(), 2);

        let by_equipment = register.query(&AssignmentQuery {
            search: Some("GUANTES".into()),
            ..Default::default()
        });
        assert_eq!(by_equipment.len(), 2);

        let waste = register.query(&AssignmentQuery {
            search: Some("merma".into()),
            ..Default::default()
        });
        assert_eq!(waste.len(), 1);
    }

    #[test]
    fn sort_is_stable_in_both_directions() {
        let register = Register::new();
        let first = register.record_assignment("B", &helmet(), 2, date(2025, 1, 1), None);
        let second = register.record_assignment("A", &helmet(), 2, date(2025, 1, 2), None);
        let third = register.record_assignment("C", &helmet(), 1, date(2025, 1, 3), None);

        let ids = |order| -> Vec<AssignmentId> {
            register
                .query(&AssignmentQuery {
                    sort: Some((SortField::Quantity, order)),
                    ..Default::default()
                })
                .iter()
                .map(|a| a.id)
                .collect()
        };
        assert_eq!(ids(SortOrder::Ascending), vec![third, first, second]);
        assert_eq!(ids(SortOrder::Descending), vec![first, second, third]);

        let by_person: Vec<AssignmentId> = register
            .query(&AssignmentQuery {
                sort: Some((SortField::Person, SortOrder::Ascending)),
                ..Default::default()
            })
            .iter()
            .map(|a| a.id)
            .collect();
        assert_eq!(by_person, vec![second, first, third]);
    }

    #[test]
    fn renewals_and_monthly_units() {
        let register = Register::new();
        register.record_assignment("Ana", &helmet(), 2, date(2025, 1, 10), Some(6));
        register.record_assignment("Luis", &helmet(), 1, date(2025, 3, 5), Some(1));
        register.record_assignment("Luis", &gloves(), 4, date(2025, 3, 20), None);
        register.record_exit(&gloves(), 9, date(2025, 3, 21));
        register.record_assignment("Eva", &gloves(), 1, date(2024, 3, 1), None);

        let due = register.renewals_due(date(2025, 7, 10));
        assert_eq!(due.len(), 2);
        assert_eq!(due[0].renewal_date, Some(date(2025, 4, 5)));

        let months = register.units_assigned_by_month(2025);
        assert_eq!(months[0], 2);
        assert_eq!(months[2], 5);
        assert_eq!(months.iter().sum::<u64>(), 7);
    }
}
