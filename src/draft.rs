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

//! Drafts of in-progress bulk stock forms.
//!
//! A draft is a [`StockBatch`] whose row fields may still be missing. It is
//! kept in a side channel through a [`DraftStore`] so an interrupted form can
//! be restored, and converted to a batch once complete.

use crate::bulk::{StockBatch, StockMode, StockRow};
use crate::error::{BulkReport, LedgerError, StorageError};
use chrono::NaiveDate;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftRow {
    pub product: Option<String>,
    pub variant: Option<String>,
    pub quantity: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockBatchDraft {
    pub mode: StockMode,
    #[serde(default)]
    pub rows: Vec<DraftRow>,
}

impl StockBatchDraft {
    pub fn new(mode: StockMode) -> Self {
        Self {
            mode,
            rows: Vec::new(),
        }
    }

    /// Converts the draft into a batch dated `date`.
    ///
    /// Every row lacking a product or a positive quantity is reported as
    /// [`LedgerError::ValidationIncomplete`]. A missing variant becomes an
    /// empty name, which only entry batches for new products accept.
    pub fn into_batch(self, date: NaiveDate) -> Result<StockBatch, BulkReport> {
        let mut report = BulkReport::default();
        let mut rows = Vec::with_capacity(self.rows.len());
        for (index, row) in self.rows.into_iter().enumerate() {
            let product = match row.product {
                Some(p) if !p.trim().is_empty() => p,
                _ => {
                    report.push(
                        vec![index],
                        LedgerError::ValidationIncomplete { field: "product" },
                    );
                    continue;
                }
            };
            let quantity = match row.quantity {
                Some(q) if q > 0 => q,
                _ => {
                    report.push(
                        vec![index],
                        LedgerError::ValidationIncomplete { field: "quantity" },
                    );
                    continue;
                }
            };
            rows.push(StockRow::new(product, row.variant.unwrap_or_default(), quantity));
        }
        if rows.is_empty() && report.is_empty() {
            report.push(Vec::new(), LedgerError::ValidationIncomplete { field: "rows" });
        }
        report.into_result()?;
        Ok(StockBatch {
            mode: self.mode,
            date,
            rows,
        })
    }
}

/// Side channel holding at most one draft.
pub trait DraftStore {
    fn save(&self, draft: &StockBatchDraft) -> Result<(), StorageError>;

    /// The saved draft, if any.
    fn load(&self) -> Result<Option<StockBatchDraft>, StorageError>;

    fn clear(&self) -> Result<(), StorageError>;
}

/// Draft stored as a JSON file.
#[derive(Debug, Clone)]
pub struct FileDraftStore {
    path: PathBuf,
}

impl FileDraftStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DraftStore for FileDraftStore {
    fn save(&self, draft: &StockBatchDraft) -> Result<(), StorageError> {
        let json = serde_json::to_string_pretty(draft)?;
        fs::write(&self.path, json)?;
        debug!(path = %self.path.display(), rows = draft.rows.len(), "draft saved");
        Ok(())
    }

    fn load(&self) -> Result<Option<StockBatchDraft>, StorageError> {
        match fs::read_to_string(&self.path) {
            Ok(json) => Ok(Some(serde_json::from_str(&json)?)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn clear(&self) -> Result<(), StorageError> {
        match fs::remove_file(&self.path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

/// Draft kept in memory as serialized JSON.
#[derive(Debug, Default)]
pub struct MemoryDraftStore {
    slot: Mutex<Option<String>>,
}

impl MemoryDraftStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DraftStore for MemoryDraftStore {
    fn save(&self, draft: &StockBatchDraft) -> Result<(), StorageError> {
        *self.slot.lock() = Some(serde_json::to_string(draft)?);
        Ok(())
    }

    fn load(&self) -> Result<Option<StockBatchDraft>, StorageError> {
        match self.slot.lock().as_deref() {
            Some(json) => Ok(Some(serde_json::from_str(json)?)),
            None => Ok(None),
        }
    }

    fn clear(&self) -> Result<(), StorageError> {
        self.slot.lock().take();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
    }

    fn draft() -> StockBatchDraft {
        StockBatchDraft {
            mode: StockMode::TransitOut,
            rows: vec![
                DraftRow {
                    product: Some("Casco".into()),
                    variant: Some("Standard".into()),
                    quantity: Some(2),
                },
                DraftRow {
                    product: Some("Botas".into()),
                    variant: None,
                    quantity: None,
                },
            ],
        }
    }

    #[test]
    fn incomplete_rows_are_reported() {
        let report = draft().into_batch(date()).unwrap_err();
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].rows, vec![1]);
        assert_eq!(
            report.failures[0].error,
            LedgerError::ValidationIncomplete { field: "quantity" }
        );
    }

    #[test]
    fn complete_draft_converts() {
        let mut draft = draft();
        draft.rows[1].quantity = Some(1);
        let batch = draft.into_batch(date()).unwrap();
        assert_eq!(batch.mode, StockMode::TransitOut);
        assert_eq!(batch.rows[1], StockRow::new("Botas", "", 1));
    }

    #[test]
    fn empty_draft_is_incomplete() {
        let report = StockBatchDraft::new(StockMode::Entry)
            .into_batch(date())
            .unwrap_err();
        assert_eq!(
            report.failures[0].error,
            LedgerError::ValidationIncomplete { field: "rows" }
        );
    }

    #[test]
    fn memory_store_round_trip() {
        let store = MemoryDraftStore::new();
        assert_eq!(store.load().unwrap(), None);
        store.save(&draft()).unwrap();
        assert_eq!(store.load().unwrap(), Some(draft()));
        store.clear().unwrap();
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn file_store_round_trip() {
        let path = std::env::temp_dir()
            .join(format!("ppe-ledger-draft-{}.json", std::process::id()));
        let store = FileDraftStore::new(&path);
        store.clear().unwrap();
        assert_eq!(store.load().unwrap(), None);

        store.save(&draft()).unwrap();
        assert_eq!(store.load().unwrap(), Some(draft()));

        store.clear().unwrap();
        assert!(!path.exists());
        store.clear().unwrap();
    }

    #[test]
    fn corrupt_file_is_a_format_error() {
        let path = std::env::temp_dir()
            .join(format!("ppe-ledger-corrupt-{}.json", std::process::id()));
        fs::write(&path, "{ not json").unwrap();
        let store = FileDraftStore::new(&path);
        assert!(matches!(store.load(), Err(StorageError::Format(_))));
        store.clear().unwrap();
    }
}
