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

//! Core identifier types for products, variants, register entries and employees.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(
    /// Stable identifier of a catalog product.
    ProductId
);

id_type!(
    /// Stable identifier of a variant (size/category) of a product.
    ///
    /// Variant IDs are unique across the whole catalog, not only within a
    /// product. Bulk commits use them as the global lock order.
    VariantId
);

id_type!(
    /// Identifier of an entry in the assignment register.
    AssignmentId
);

id_type!(
    /// Identifier of an employee in the directory.
    EmployeeId
);

/// Monotonic ID source. IDs start at 1 and are never reused.
#[derive(Debug)]
pub(crate) struct IdSequence(AtomicU32);

impl IdSequence {
    pub(crate) fn new() -> Self {
        Self(AtomicU32::new(1))
    }

    pub(crate) fn next(&self) -> u32 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for IdSequence {
    fn default() -> Self {
        Self::new()
    }
}

/// Normalizes a display name into its lookup key.
///
/// Catalog names are stored as typed but matched trimmed and case-insensitively.
pub(crate) fn lookup_key(name: &str) -> String {
    name.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_starts_at_one_and_increments() {
        let ids = IdSequence::new();
        assert_eq!(ids.next(), 1);
        assert_eq!(ids.next(), 2);
        assert_eq!(ids.next(), 3);
    }

    #[test]
    fn lookup_key_ignores_case_and_padding() {
        assert_eq!(lookup_key("  Casco Blanco "), "casco blanco");
        assert_eq!(lookup_key("ÚNICO"), "único");
    }

    #[test]
    fn ids_serialize_transparently() {
        let json = serde_json::to_string(&VariantId(7)).unwrap();
        assert_eq!(json, "7");
    }
}
