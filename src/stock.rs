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

//! Per-variant stock counters.
//!
//! Units move between two counters. Assignment and waste remove units from
//! the ledger entirely; entries add them.
//!
//! ```text
//!  entry ──credit──► on_hand ──debit──► assigned / wasted
//!                     │   ▲
//!          transit_out│   │transit_return
//!                     ▼   │
//!                   in_transit
//! ```
//!
//! # Example
//!
//! ```
//! use ppe_ledger::StockLevels;
//!
//! let mut levels = StockLevels::new(10);
//! levels.move_to_transit(4).unwrap();
//! assert_eq!(levels.on_hand(), 6);
//! assert_eq!(levels.in_transit(), 4);
//! ```

use crate::error::LedgerError;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Why a counter operation was refused.
///
/// Carries no names; the ledger attaches product and variant when turning
/// it into a [`LedgerError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shortfall {
    InvalidQuantity,
    Overflow,
    OnHand { requested: u32, available: u32 },
    InTransit { requested: u32, available: u32 },
}

impl Shortfall {
    pub fn into_error(self, product: &str, variant: &str) -> LedgerError {
        match self {
            Shortfall::InvalidQuantity => LedgerError::InvalidQuantity,
            Shortfall::Overflow => LedgerError::QuantityOverflow,
            Shortfall::OnHand {
                requested,
                available,
            } => LedgerError::InsufficientStock {
                product: product.to_string(),
                variant: variant.to_string(),
                requested: requested.into(),
                available,
            },
            Shortfall::InTransit {
                requested,
                available,
            } => LedgerError::InsufficientTransitStock {
                product: product.to_string(),
                variant: variant.to_string(),
                requested: requested.into(),
                available,
            },
        }
    }
}

/// On-hand and in-transit counters of one variant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLevels {
    on_hand: u32,
    in_transit: u32,
}

impl StockLevels {
    pub fn new(on_hand: u32) -> Self {
        Self {
            on_hand,
            in_transit: 0,
        }
    }

    pub fn on_hand(&self) -> u32 {
        self.on_hand
    }

    pub fn in_transit(&self) -> u32 {
        self.in_transit
    }

    /// Returns `on_hand + in_transit`.
    pub fn total(&self) -> u64 {
        u64::from(self.on_hand) + u64::from(self.in_transit)
    }

    /// Decreases on-hand stock. Single gate for assignment, exit and waste.
    pub fn debit_on_hand(&mut self, qty: u32) -> Result<(), Shortfall> {
        if qty == 0 {
            return Err(Shortfall::InvalidQuantity);
        }
        if self.on_hand < qty {
            return Err(Shortfall::OnHand {
                requested: qty,
                available: self.on_hand,
            });
        }
        self.on_hand -= qty;
        Ok(())
    }

    /// Increases on-hand stock.
    pub fn credit_on_hand(&mut self, qty: u32) -> Result<(), Shortfall> {
        if qty == 0 {
            return Err(Shortfall::InvalidQuantity);
        }
        self.on_hand = self.on_hand.checked_add(qty).ok_or(Shortfall::Overflow)?;
        Ok(())
    }

    /// Moves units from on-hand to in-transit.
    pub fn move_to_transit(&mut self, qty: u32) -> Result<(), Shortfall> {
        if qty == 0 {
            return Err(Shortfall::InvalidQuantity);
        }
        if self.on_hand < qty {
            return Err(Shortfall::OnHand {
                requested: qty,
                available: self.on_hand,
            });
        }
        let in_transit = self
            .in_transit
            .checked_add(qty)
            .ok_or(Shortfall::Overflow)?;
        self.on_hand -= qty;
        self.in_transit = in_transit;
        Ok(())
    }

    /// Moves units from in-transit back to on-hand.
    pub fn return_from_transit(&mut self, qty: u32) -> Result<(), Shortfall> {
        if qty == 0 {
            return Err(Shortfall::InvalidQuantity);
        }
        if self.in_transit < qty {
            return Err(Shortfall::InTransit {
                requested: qty,
                available: self.in_transit,
            });
        }
        let on_hand = self.on_hand.checked_add(qty).ok_or(Shortfall::Overflow)?;
        self.in_transit -= qty;
        self.on_hand = on_hand;
        Ok(())
    }
}

/// Shared handle to the counters of one variant.
///
/// Cloning the handle shares the counters. The catalog hands these out so
/// callers can lock variants without holding catalog map guards.
#[derive(Debug, Clone, Default)]
pub struct SharedStock(Arc<Mutex<StockLevels>>);

impl SharedStock {
    pub fn new(levels: StockLevels) -> Self {
        Self(Arc::new(Mutex::new(levels)))
    }

    pub fn lock(&self) -> parking_lot::MutexGuard<'_, StockLevels> {
        self.0.lock()
    }

    /// Copies the current counters.
    pub fn levels(&self) -> StockLevels {
        *self.0.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debit_decreases_on_hand() {
        let mut levels = StockLevels::new(10);
        levels.debit_on_hand(4).unwrap();
        assert_eq!(levels.on_hand(), 6);
        assert_eq!(levels.in_transit(), 0);
    }

    #[test]
    fn debit_more_than_on_hand_is_refused_without_mutation() {
        let mut levels = StockLevels::new(3);
        let result = levels.debit_on_hand(5);
        assert_eq!(
            result,
            Err(Shortfall::OnHand {
                requested: 5,
                available: 3
            })
        );
        assert_eq!(levels.on_hand(), 3);
    }

    #[test]
    fn zero_quantity_is_refused_everywhere() {
        let mut levels = StockLevels::new(3);
        assert_eq!(levels.debit_on_hand(0), Err(Shortfall::InvalidQuantity));
        assert_eq!(levels.credit_on_hand(0), Err(Shortfall::InvalidQuantity));
        assert_eq!(levels.move_to_transit(0), Err(Shortfall::InvalidQuantity));
        assert_eq!(
            levels.return_from_transit(0),
            Err(Shortfall::InvalidQuantity)
        );
    }

    #[test]
    fn transit_round_trip_conserves_units() {
        let mut levels = StockLevels::new(8);
        levels.move_to_transit(5).unwrap();
        assert_eq!(levels.total(), 8);
        levels.return_from_transit(5).unwrap();
        assert_eq!(levels, StockLevels::new(8));
    }

    #[test]
    fn return_more_than_in_transit_is_refused() {
        let mut levels = StockLevels::new(8);
        levels.move_to_transit(2).unwrap();
        let result = levels.return_from_transit(3);
        assert_eq!(
            result,
            Err(Shortfall::InTransit {
                requested: 3,
                available: 2
            })
        );
        assert_eq!(levels.on_hand(), 6);
        assert_eq!(levels.in_transit(), 2);
    }

    #[test]
    fn credit_overflow_is_refused() {
        let mut levels = StockLevels::new(u32::MAX);
        assert_eq!(levels.credit_on_hand(1), Err(Shortfall::Overflow));
        assert_eq!(levels.on_hand(), u32::MAX);
    }

    #[test]
    fn shortfall_maps_to_named_error() {
        let error = Shortfall::InTransit {
            requested: 4,
            available: 1,
        }
        .into_error("Casco", "Ajustable");
        assert_eq!(
            error,
            LedgerError::InsufficientTransitStock {
                product: "Casco".into(),
                variant: "Ajustable".into(),
                requested: 4,
                available: 1,
            }
        );
    }

    #[test]
    fn shared_stock_clones_share_counters() {
        let stock = SharedStock::new(StockLevels::new(5));
        let other = stock.clone();
        other.lock().debit_on_hand(2).unwrap();
        assert_eq!(stock.levels().on_hand(), 3);
    }
}
