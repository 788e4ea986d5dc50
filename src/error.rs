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

//! Error types for booking and rate operations.

use crate::base::{BookingId, GuestCount, RateId};
use crate::booking::{BookingStatus, PaymentStatus};
use thiserror::Error;

/// Booking engine errors.
///
/// Every failure the engine can produce is a typed variant carrying the
/// data a caller needs to act on it; none of them is retried internally.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BookingError {
    /// Request shape is invalid; names the offending field
    #[error("invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    /// Requested range overlaps one or more blocking bookings
    #[error("date range conflicts with booking(s) {}", join_ids(.ids))]
    DateConflict { ids: Vec<BookingId> },

    /// Special rate window overlaps an existing active special rate
    #[error("date range overlaps active special rate {conflicting}")]
    OverlappingRate { conflicting: RateId },

    /// Refusing to deactivate the only active base rate for a guest count
    #[error("cannot deactivate the only active base rate for {guests} guest(s)")]
    LastBaseRate { guests: GuestCount },

    /// No base or special rate covers a night that must be priced
    #[error("no active rate available for {guests} guest(s)")]
    NoRateAvailable { guests: GuestCount },

    /// Booking status transition not in the lifecycle table
    #[error("illegal status transition from {from} to {to}")]
    IllegalTransition {
        from: BookingStatus,
        to: BookingStatus,
    },

    /// Payment status transition not in the payment table
    #[error("illegal payment transition from {from} to {to}")]
    IllegalPaymentTransition {
        from: PaymentStatus,
        to: PaymentStatus,
    },

    /// Paid/partial payment attempted on a rejected booking
    #[error("a rejected booking cannot carry a payment")]
    PaymentOnRejected,

    /// Referenced booking does not exist
    #[error("booking {id} not found")]
    BookingNotFound { id: BookingId },

    /// Referenced rate does not exist
    #[error("rate {id} not found")]
    RateNotFound { id: RateId },

    /// Catalog invariant violated; fail closed rather than guess
    #[error("rate catalog integrity violation: {detail}")]
    DataIntegrity { detail: String },
}

impl BookingError {
    pub(crate) fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        BookingError::Validation {
            field,
            reason: reason.into(),
        }
    }
}

fn join_ids(ids: &[BookingId]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        assert_eq!(
            BookingError::validation("check_in", "not a date").to_string(),
            "invalid check_in: not a date"
        );
        assert_eq!(
            BookingError::DateConflict {
                ids: vec![BookingId(3), BookingId(9)]
            }
            .to_string(),
            "date range conflicts with booking(s) 3, 9"
        );
        assert_eq!(
            BookingError::OverlappingRate {
                conflicting: RateId(4)
            }
            .to_string(),
            "date range overlaps active special rate 4"
        );
        assert_eq!(
            BookingError::LastBaseRate {
                guests: GuestCount::One
            }
            .to_string(),
            "cannot deactivate the only active base rate for 1 guest(s)"
        );
        assert_eq!(
            BookingError::IllegalTransition {
                from: BookingStatus::Rejected,
                to: BookingStatus::Approved,
            }
            .to_string(),
            "illegal status transition from rejected to approved"
        );
        assert_eq!(
            BookingError::PaymentOnRejected.to_string(),
            "a rejected booking cannot carry a payment"
        );
    }

    #[test]
    fn errors_are_cloneable() {
        let error = BookingError::BookingNotFound { id: BookingId(1) };
        let cloned = error.clone();
        assert_eq!(error, cloned);
    }
}
