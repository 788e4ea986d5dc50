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

//! # Booking Engine
//!
//! This library provides the booking core for a single-property short-stay
//! rental: calendar availability, nightly rate resolution, and the guarded
//! booking/payment lifecycle behind a public booking form and an admin
//! console.
//!
//! ## Core Components
//!
//! - [`BookingEngine`]: the single orchestrator the HTTP layer talks to
//! - [`RateCatalog`]: append-only base and special rates per guest count
//! - [`Booking`]: a reservation request and its two state machines
//! - [`BookingError`]: typed failures for every way an operation can fail
//!
//! ## Example
//!
//! ```
//! use booking_engine_rs::{
//!     Actor, BookingEngine, BookingRequest, GuestCount, RateDraft, RateKind,
//! };
//! use chrono::{Days, Utc};
//! use rust_decimal_macros::dec;
//!
//! let engine = BookingEngine::new();
//! let staff = Actor::staff("admin@example.com");
//!
//! // Set the nightly base rate for two guests.
//! engine
//!     .upsert_rate(
//!         RateDraft {
//!             id: None,
//!             kind: RateKind::Base,
//!             guests: GuestCount::Two,
//!             amount_per_night: dec!(950.00),
//!             start_date: None,
//!             end_date: None,
//!             description: None,
//!         },
//!         &staff,
//!     )
//!     .unwrap();
//!
//! // A guest requests a three-night stay.
//! let check_in = Utc::now().date_naive() + Days::new(30);
//! let check_out = check_in + Days::new(3);
//! let booking = engine
//!     .create_booking(
//!         &BookingRequest {
//!             check_in: check_in.to_string(),
//!             check_out: check_out.to_string(),
//!             guests: 2,
//!             guest_name: "Thandi Nkosi".to_string(),
//!             email: "thandi@example.com".to_string(),
//!             phone: "063 000 0000".to_string(),
//!             special_requests: None,
//!         },
//!         &Actor::Guest,
//!     )
//!     .unwrap();
//!
//! assert_eq!(booking.total, dec!(2850.00));
//! ```
//!
//! ## Thread Safety
//!
//! The engine serializes the conflict check and insert for the single room,
//! so two concurrent requests for overlapping dates can never both succeed;
//! rate catalog edits serialize per guest count.

pub mod availability;
mod base;
pub mod booking;
mod engine;
pub mod error;
mod notify;
mod pricing;
mod rate;

pub use base::{BookingId, GuestCount, RateId};
pub use booking::{
    Actor, Booking, BookingSource, BookingStatus, GuestContact, HistoryEntry, HistoryEvent,
    PaymentRecord, PaymentStatus, PaymentUpdate,
};
pub use engine::{
    BookingEngine, BookingRequest, CalendarEntry, DashboardStats, ExternalBooking, ImportOutcome,
    ValidatedRequest,
};
pub use error::BookingError;
pub use notify::{Notification, Notifier};
pub use pricing::{NightRate, Quote};
pub use rate::{Rate, RateCatalog, RateDraft, RateFilter, RateKind};
