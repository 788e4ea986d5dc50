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

//! Rate records and the rate catalog.
//!
//! The catalog is append-only: rates are deactivated, never removed, so
//! pricing history stays auditable. Two invariants hold per guest count:
//! at most one active base rate, and no overlapping active special rate
//! windows. Special windows are inclusive on both ends (a rate is valid
//! *on* its end date), unlike booking occupancy which is half-open.

use crate::base::{GuestCount, RateId};
use crate::booking::Actor;
use crate::error::BookingError;
use chrono::{DateTime, NaiveDate, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};

/// Rate kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateKind {
    /// Default nightly price for a guest count, always-on fallback
    Base,
    /// Promotional price valid only within an explicit date window
    Special,
}

impl RateKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Base => "base",
            Self::Special => "special",
        }
    }
}

impl fmt::Display for RateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RateKind {
    type Err = BookingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "base" => Ok(Self::Base),
            "special" => Ok(Self::Special),
            other => Err(BookingError::validation(
                "kind",
                format!("unknown rate kind '{other}'"),
            )),
        }
    }
}

/// A nightly rate record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rate {
    pub id: RateId,
    pub kind: RateKind,
    pub guests: GuestCount,
    pub amount_per_night: Decimal,
    /// Inclusive window start; `Some` only for special rates
    pub start_date: Option<NaiveDate>,
    /// Inclusive window end; `Some` only for special rates
    pub end_date: Option<NaiveDate>,
    pub description: Option<String>,
    /// Soft-delete flag; inactive rates are kept for audit
    pub active: bool,
    pub created_by: String,
    pub updated_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Rate {
    /// Returns true if this special rate's inclusive window contains `date`.
    ///
    /// Base rates have no window and always return false here.
    pub fn covers(&self, date: NaiveDate) -> bool {
        match (self.start_date, self.end_date) {
            (Some(start), Some(end)) => start <= date && date <= end,
            _ => false,
        }
    }
}

/// Input for creating or updating a rate.
///
/// With `id: None` a new active rate is created; with `id: Some` the
/// existing record is updated in place under the same validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateDraft {
    pub id: Option<RateId>,
    pub kind: RateKind,
    pub guests: GuestCount,
    pub amount_per_night: Decimal,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub description: Option<String>,
}

/// Listing filters for the admin surface.
#[derive(Debug, Clone, Copy, Default)]
pub struct RateFilter {
    pub kind: Option<RateKind>,
    pub guests: Option<GuestCount>,
    pub active_only: bool,
}

/// The rate catalog.
///
/// Rates live in one shard per guest count; every invariant is scoped to a
/// single guest count, so the shard entry lock is exactly the serialization
/// the mutations need. Concurrent edits for different guest counts never
/// contend.
#[derive(Debug)]
pub struct RateCatalog {
    shards: DashMap<GuestCount, Vec<Rate>>,
    next_id: AtomicU32,
}

impl RateCatalog {
    /// Creates an empty catalog with a shard per guest count.
    pub fn new() -> Self {
        let shards = DashMap::new();
        for guests in GuestCount::ALL {
            shards.insert(guests, Vec::new());
        }
        RateCatalog {
            shards,
            next_id: AtomicU32::new(1),
        }
    }

    /// Returns the active base rate for a guest count.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::NoRateAvailable`] when no active base rate
    /// exists; the resolver has no fallback below base.
    pub fn active_base(&self, guests: GuestCount) -> Result<Rate, BookingError> {
        self.shards
            .get(&guests)
            .and_then(|shard| {
                shard
                    .iter()
                    .find(|rate| rate.kind == RateKind::Base && rate.active)
                    .cloned()
            })
            .ok_or(BookingError::NoRateAvailable { guests })
    }

    /// Returns the unique active special rate covering `date`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::DataIntegrity`] when more than one active
    /// special covers the date; resolution never silently picks one.
    pub fn special_for(
        &self,
        guests: GuestCount,
        date: NaiveDate,
    ) -> Result<Option<Rate>, BookingError> {
        let Some(shard) = self.shards.get(&guests) else {
            return Ok(None);
        };

        let mut matches = shard
            .iter()
            .filter(|rate| rate.kind == RateKind::Special && rate.active && rate.covers(date));

        let first = matches.next().cloned();
        if first.is_some() && matches.next().is_some() {
            return Err(BookingError::DataIntegrity {
                detail: format!("multiple active special rates cover {date} for {guests} guest(s)"),
            });
        }
        Ok(first)
    }

    /// Creates a new rate or updates an existing one.
    ///
    /// Creating an active base rate deactivates the prior active base for
    /// that guest count in the same shard lock, so two active base rates
    /// never coexist.
    ///
    /// # Errors
    ///
    /// - [`BookingError::Validation`] for a non-positive amount, a missing
    ///   or inverted special window, or a window on a base rate.
    /// - [`BookingError::OverlappingRate`] naming the conflicting rate when
    ///   a special window overlaps another active special.
    /// - [`BookingError::RateNotFound`] for an unknown update id.
    pub fn upsert(&self, draft: RateDraft, actor: &Actor) -> Result<Rate, BookingError> {
        validate_draft(&draft)?;

        let mut shard = self
            .shards
            .get_mut(&draft.guests)
            .ok_or_else(|| BookingError::DataIntegrity {
                detail: format!("missing catalog shard for {} guest(s)", draft.guests),
            })?;

        // Overlap check against every other active special of this guest
        // count: overlap iff new_start <= existing_end && new_end >= existing_start.
        if draft.kind == RateKind::Special {
            let (new_start, new_end) = (draft.start_date, draft.end_date);
            let conflict = shard.iter().find(|existing| {
                existing.kind == RateKind::Special
                    && existing.active
                    && Some(existing.id) != draft.id
                    && windows_overlap(new_start, new_end, existing.start_date, existing.end_date)
            });
            if let Some(existing) = conflict {
                return Err(BookingError::OverlappingRate {
                    conflicting: existing.id,
                });
            }
        }

        let now = Utc::now();

        if let Some(id) = draft.id {
            let index = shard
                .iter()
                .position(|rate| rate.id == id)
                .ok_or(BookingError::RateNotFound { id })?;
            if shard[index].kind != draft.kind {
                return Err(BookingError::validation(
                    "kind",
                    "a rate's kind cannot change after creation",
                ));
            }
            let rate = &mut shard[index];
            rate.amount_per_night = draft.amount_per_night;
            rate.start_date = draft.start_date;
            rate.end_date = draft.end_date;
            rate.description = draft.description;
            rate.updated_by = Some(actor.to_string());
            rate.updated_at = Some(now);
            return Ok(rate.clone());
        }

        // A new active base supersedes the previous one atomically.
        if draft.kind == RateKind::Base {
            for rate in shard
                .iter_mut()
                .filter(|rate| rate.kind == RateKind::Base && rate.active)
            {
                rate.active = false;
                rate.updated_by = Some(actor.to_string());
                rate.updated_at = Some(now);
            }
        }

        let rate = Rate {
            id: RateId(self.next_id.fetch_add(1, Ordering::Relaxed)),
            kind: draft.kind,
            guests: draft.guests,
            amount_per_night: draft.amount_per_night,
            start_date: draft.start_date,
            end_date: draft.end_date,
            description: draft.description,
            active: true,
            created_by: actor.to_string(),
            updated_by: None,
            created_at: now,
            updated_at: None,
        };
        shard.push(rate.clone());
        Ok(rate)
    }

    /// Soft-deletes a rate.
    ///
    /// # Errors
    ///
    /// - [`BookingError::RateNotFound`] for an unknown id.
    /// - [`BookingError::LastBaseRate`] when the target is the only active
    ///   base rate for its guest count.
    pub fn deactivate(&self, id: RateId, actor: &Actor) -> Result<Rate, BookingError> {
        for guests in GuestCount::ALL {
            let Some(mut shard) = self.shards.get_mut(&guests) else {
                continue;
            };
            let Some(index) = shard.iter().position(|rate| rate.id == id) else {
                continue;
            };

            if shard[index].kind == RateKind::Base && shard[index].active {
                let other_active_base = shard
                    .iter()
                    .any(|rate| rate.kind == RateKind::Base && rate.active && rate.id != id);
                if !other_active_base {
                    return Err(BookingError::LastBaseRate { guests });
                }
            }

            let rate = &mut shard[index];
            rate.active = false;
            rate.updated_by = Some(actor.to_string());
            rate.updated_at = Some(Utc::now());
            return Ok(rate.clone());
        }
        Err(BookingError::RateNotFound { id })
    }

    /// Lists rates, base first, then by guest count and window start.
    pub fn rates(&self, filter: RateFilter) -> Vec<Rate> {
        let mut result: Vec<Rate> = self
            .shards
            .iter()
            .flat_map(|shard| shard.value().clone())
            .filter(|rate| {
                filter.kind.is_none_or(|kind| rate.kind == kind)
                    && filter.guests.is_none_or(|guests| rate.guests == guests)
                    && (!filter.active_only || rate.active)
            })
            .collect();
        result.sort_by_key(|rate| {
            (
                rate.kind == RateKind::Special,
                rate.guests.as_u8(),
                rate.start_date,
                rate.id,
            )
        });
        result
    }
}

impl Default for RateCatalog {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_draft(draft: &RateDraft) -> Result<(), BookingError> {
    if draft.amount_per_night <= Decimal::ZERO {
        return Err(BookingError::validation(
            "amount_per_night",
            "amount must be greater than 0",
        ));
    }
    match draft.kind {
        RateKind::Special => {
            let start = draft.start_date.ok_or_else(|| {
                BookingError::validation("start_date", "special rates require a start date")
            })?;
            let end = draft.end_date.ok_or_else(|| {
                BookingError::validation("end_date", "special rates require an end date")
            })?;
            if end < start {
                return Err(BookingError::validation(
                    "end_date",
                    "end date must be on or after the start date",
                ));
            }
        }
        RateKind::Base => {
            if draft.start_date.is_some() || draft.end_date.is_some() {
                return Err(BookingError::validation(
                    "start_date",
                    "base rates do not take a date window",
                ));
            }
        }
    }
    Ok(())
}

fn windows_overlap(
    a_start: Option<NaiveDate>,
    a_end: Option<NaiveDate>,
    b_start: Option<NaiveDate>,
    b_end: Option<NaiveDate>,
) -> bool {
    match (a_start, a_end, b_start, b_end) {
        (Some(a_start), Some(a_end), Some(b_start), Some(b_end)) => {
            a_start <= b_end && a_end >= b_start
        }
        _ => false,
    }
}
