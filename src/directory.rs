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

//! Employee directory.
//!
//! Register entries join to employees by name, so names are unique (exact
//! match). Renames are propagated to the register by
//! [`Engine::update_employee`](crate::Engine::update_employee); deleting an
//! employee leaves their register history in place.

use crate::base::{EmployeeId, IdSequence};
use crate::error::LedgerError;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    pub id: EmployeeId,
    pub name: String,
    pub role: Option<String>,
    pub department: Option<String>,
    pub email: Option<String>,
}

/// Employee to create.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEmployee {
    pub name: String,
    pub role: Option<String>,
    pub department: Option<String>,
    pub email: Option<String>,
}

impl NewEmployee {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Default)]
pub struct Directory {
    employees: DashMap<EmployeeId, Employee>,
    /// Exact name to owner. Claimed before an employee is stored or renamed.
    names: DashMap<String, EmployeeId>,
    ids: IdSequence,
}

impl Directory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_employee(&self, new: NewEmployee) -> Result<EmployeeId, LedgerError> {
        let name = new.name.trim().to_string();
        if name.is_empty() {
            return Err(LedgerError::EmptyName);
        }
        let id = match self.names.entry(name.clone()) {
            Entry::Occupied(_) => return Err(LedgerError::DuplicateEmployee(name)),
            Entry::Vacant(entry) => *entry.insert(EmployeeId(self.ids.next())),
        };
        self.employees.insert(
            id,
            Employee {
                id,
                name,
                role: new.role,
                department: new.department,
                email: new.email,
            },
        );
        Ok(id)
    }

    pub fn get(&self, id: EmployeeId) -> Option<Employee> {
        self.employees.get(&id).map(|e| e.clone())
    }

    pub fn find_by_name(&self, name: &str) -> Option<Employee> {
        let id = self.names.get(name).map(|id| *id)?;
        self.get(id)
    }

    /// Every employee, sorted by name.
    pub fn employees(&self) -> Vec<Employee> {
        let mut all: Vec<Employee> = self.employees.iter().map(|e| e.clone()).collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    /// Employees whose name or role contains `term`, ignoring case.
    pub fn search(&self, term: &str) -> Vec<Employee> {
        let term = term.trim().to_lowercase();
        self.employees()
            .into_iter()
            .filter(|e| {
                e.name.to_lowercase().contains(&term)
                    || e
                        .role
                        .as_deref()
                        .is_some_and(|r| r.to_lowercase().contains(&term))
            })
            .collect()
    }

    /// Replaces an employee's fields, returning the previous record.
    pub(crate) fn replace(
        &self,
        id: EmployeeId,
        update: NewEmployee,
    ) -> Result<Employee, LedgerError> {
        let name = update.name.trim().to_string();
        if name.is_empty() {
            return Err(LedgerError::EmptyName);
        }
        let mut employee = self
            .employees
            .get_mut(&id)
            .ok_or(LedgerError::EmployeeNotFound(id))?;
        if employee.name != name {
            match self.names.entry(name.clone()) {
                Entry::Occupied(_) => return Err(LedgerError::DuplicateEmployee(name)),
                Entry::Vacant(entry) => {
                    entry.insert(id);
                }
            }
            self.names.remove(&employee.name);
        }
        let previous = employee.clone();
        *employee = Employee {
            id,
            name,
            role: update.role,
            department: update.department,
            email: update.email,
        };
        Ok(previous)
    }

    /// Removes an employee. Register history is not touched.
    pub fn delete_employee(&self, id: EmployeeId) -> Result<Employee, LedgerError> {
        let (_, employee) = self
            .employees
            .remove(&id)
            .ok_or(LedgerError::EmployeeNotFound(id))?;
        self.names.remove(&employee.name);
        Ok(employee)
    }

    pub fn len(&self) -> usize {
        self.employees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.employees.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_unique_and_required() {
        let directory = Directory::new();
        directory.add_employee(NewEmployee::named("Ana Soto")).unwrap();
        assert_eq!(
            directory.add_employee(NewEmployee::named("Ana Soto")),
            Err(LedgerError::DuplicateEmployee("Ana Soto".into()))
        );
        assert_eq!(
            directory.add_employee(NewEmployee::named("  ")),
            Err(LedgerError::EmptyName)
        );
    }

    #[test]
    fn search_matches_name_or_role() {
        let directory = Directory::new();
        directory
            .add_employee(NewEmployee {
                name: "Pedro Rojas".into(),
                role: Some("Bodeguero".into()),
                ..Default::default()
            })
            .unwrap();
        directory.add_employee(NewEmployee::named("Marta Díaz")).unwrap();

        assert_eq!(directory.search("bodega").len(), 0);
        assert_eq!(directory.search("BODEGUERO").len(), 1);
        assert_eq!(directory.search("díaz")[0].name, "Marta Díaz");
        assert_eq!(directory.search("").len(), 2);
    }

    #[test]
    fn replace_keeps_id_and_checks_collisions() {
        let directory = Directory::new();
        let ana = directory.add_employee(NewEmployee::named("Ana")).unwrap();
        directory.add_employee(NewEmployee::named("Luis")).unwrap();

        assert_eq!(
            directory.replace(ana, NewEmployee::named("Luis")),
            Err(LedgerError::DuplicateEmployee("Luis".into()))
        );
        let previous = directory.replace(ana, NewEmployee::named("Ana Soto")).unwrap();
        assert_eq!(previous.name, "Ana");
        assert_eq!(directory.get(ana).unwrap().name, "Ana Soto");
        assert!(directory.find_by_name("Ana").is_none());
    }

    #[test]
    fn concurrent_adds_claim_a_name_once() {
        let directory = Directory::new();
        let added = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| s.spawn(|| directory.add_employee(NewEmployee::named("Ana")).is_ok()))
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap_or(false))
                .filter(|added| *added)
                .count()
        });
        assert_eq!(added, 1);
        assert_eq!(directory.len(), 1);
    }

    #[test]
    fn freed_names_can_be_reused() {
        let directory = Directory::new();
        let ana = directory.add_employee(NewEmployee::named("Ana")).unwrap();
        directory.replace(ana, NewEmployee::named("Ana Soto")).unwrap();
        let other = directory.add_employee(NewEmployee::named("Ana")).unwrap();
        assert_eq!(directory.find_by_name("Ana").unwrap().id, other);

        directory.delete_employee(other).unwrap();
        assert!(directory.find_by_name("Ana").is_none());
        directory.add_employee(NewEmployee::named("Ana")).unwrap();
    }

    #[test]
    fn delete_unknown_employee_fails() {
        let directory = Directory::new();
        let id = directory.add_employee(NewEmployee::named("Ana")).unwrap();
        directory.delete_employee(id).unwrap();
        assert_eq!(
            directory.delete_employee(id),
            Err(LedgerError::EmployeeNotFound(id))
        );
    }
}
