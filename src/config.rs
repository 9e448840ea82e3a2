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

//! Ledger configuration.
//!
//! All fields have defaults, so a partial JSON document is enough:
//!
//! ```
//! use ppe_ledger::LedgerConfig;
//!
//! let config: LedgerConfig = serde_json::from_str(r#"{ "default_min_stock": 4 }"#).unwrap();
//! assert_eq!(config.default_min_stock, 4);
//! assert_eq!(config.fallback_category, "Generales");
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Category assigned to auto-provisioned products and to products whose
    /// category tag is deleted. Cannot itself be deleted.
    pub fallback_category: String,
    /// Reorder threshold given to auto-provisioned variants.
    pub default_min_stock: u32,
    /// Variant name used when an entry creates a product without naming one.
    pub default_variant_name: String,
    /// Products expiring within this many days are reported as expiring.
    pub expiry_warning_days: i64,
    /// Products expiring within this many days are reported as critical.
    pub expiry_critical_days: i64,
    /// Category tags present when the engine starts.
    pub categories: Vec<String>,
    /// Most movements the journal holds before dropping the oldest.
    /// Unset keeps every movement until drained.
    pub journal_capacity: Option<usize>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            fallback_category: "Generales".to_string(),
            default_min_stock: 10,
            default_variant_name: "Único".to_string(),
            expiry_warning_days: 30,
            expiry_critical_days: 5,
            categories: vec![
                "EPP".to_string(),
                "Insumos".to_string(),
                "Generales".to_string(),
            ],
            journal_capacity: None,
        }
    }
}

impl LedgerConfig {
    /// Reads a JSON configuration file.
    pub fn from_file(path: &Path) -> Result<Self, crate::StorageError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_dashboard_behavior() {
        let config = LedgerConfig::default();
        assert_eq!(config.fallback_category, "Generales");
        assert_eq!(config.default_min_stock, 10);
        assert_eq!(config.expiry_warning_days, 30);
        assert_eq!(config.expiry_critical_days, 5);
        assert!(config.categories.contains(&"Generales".to_string()));
        assert_eq!(config.journal_capacity, None);
    }

    #[test]
    fn empty_document_yields_defaults() {
        let config: LedgerConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, LedgerConfig::default());
    }
}
