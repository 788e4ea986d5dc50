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

//! Nightly rate resolution.
//!
//! Walks every night of a stay, letting a special rate override the base
//! rate for the nights it covers, and sums an exact decimal total. Amounts
//! stay unrounded through the computation; display rounding happens at the
//! serialization edge only.

use crate::base::GuestCount;
use crate::error::BookingError;
use crate::rate::{Rate, RateCatalog, RateKind};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// The resolved price of one night.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NightRate {
    pub date: NaiveDate,
    pub rate: Decimal,
    pub kind: RateKind,
    pub description: String,
}

/// A priced stay with its per-night breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub guests: GuestCount,
    pub nights: u32,
    pub nightly: Vec<NightRate>,
    pub total: Decimal,
}

/// Prices every night in `[check_in, check_out)`.
///
/// A special rate always wins for the nights its window covers; other
/// nights fall back to the active base rate. Callers validate the date
/// order upstream; `check_out <= check_in` never reaches this function.
///
/// # Errors
///
/// - [`BookingError::NoRateAvailable`] when a night has neither a special
///   nor a base rate; a stay is never silently priced at zero.
/// - [`BookingError::DataIntegrity`] when overlapping active specials are
///   found for one night.
pub fn quote(
    catalog: &RateCatalog,
    check_in: NaiveDate,
    check_out: NaiveDate,
    guests: GuestCount,
) -> Result<Quote, BookingError> {
    let mut nightly = Vec::new();
    let mut total = Decimal::ZERO;
    // A missing base rate only matters for nights no special covers, so the
    // lookup result is held and its error raised on first use.
    let base: Result<Rate, BookingError> = catalog.active_base(guests);

    for date in check_in.iter_days().take_while(|day| *day < check_out) {
        let night = match catalog.special_for(guests, date)? {
            Some(special) => NightRate {
                date,
                rate: special.amount_per_night,
                kind: RateKind::Special,
                description: special
                    .description
                    .unwrap_or_else(|| "special rate".to_string()),
            },
            None => {
                let base = base.as_ref().map_err(Clone::clone)?;
                NightRate {
                    date,
                    rate: base.amount_per_night,
                    kind: RateKind::Base,
                    description: format!("base rate for {guests} guest(s)"),
                }
            }
        };
        total += night.rate;
        nightly.push(night);
    }

    Ok(Quote {
        check_in,
        check_out,
        guests,
        nights: nightly.len() as u32,
        nightly,
        total,
    })
}
