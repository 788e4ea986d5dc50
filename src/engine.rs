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

//! Booking engine.
//!
//! The [`BookingEngine`] is the single entry point for the HTTP layer: it
//! validates request shape, prices stays through the rate catalog, guards
//! the booking and payment lifecycles, and answers calendar queries.
//!
//! # Concurrency
//!
//! The property has one room, so the no-overlap invariant spans the whole
//! booking store. "Check conflict, then insert" therefore runs inside one
//! write-lock section; two concurrent creations for overlapping ranges can
//! never both succeed. External-uid deduplication reserves the uid through
//! an atomic map entry before the store is touched, and releases it again
//! if the creation fails.

use crate::availability;
use crate::base::{BookingId, GuestCount, RateId};
use crate::booking::{
    Actor, Booking, BookingSource, BookingStatus, GuestContact, PaymentStatus, PaymentUpdate,
};
use crate::error::BookingError;
use crate::notify::{Notification, Notifier};
use crate::pricing::{self, Quote};
use crate::rate::{Rate, RateCatalog, RateDraft, RateFilter};
use chrono::{NaiveDate, Utc};
use crossbeam::channel::Sender;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU32, Ordering};

/// A raw booking request as it arrives from the public form.
///
/// Dates are strings on purpose: shape validation, including parseability,
/// happens here with field-level errors before anything downstream runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingRequest {
    pub check_in: String,
    pub check_out: String,
    pub guests: u8,
    pub guest_name: String,
    pub email: String,
    pub phone: String,
    pub special_requests: Option<String>,
}

/// A request that passed shape validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedRequest {
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub guests: GuestCount,
    pub contact: GuestContact,
    pub special_requests: Option<String>,
}

impl BookingRequest {
    /// Validates the request shape against `today`.
    ///
    /// All failures are [`BookingError::Validation`] naming the field; the
    /// first offending field wins. Nothing below this method re-validates
    /// shape.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a missing contact field, an
    /// unparseable date, `check_out <= check_in`, a past check-in, or a
    /// guest count outside {1, 2}.
    pub fn validate(&self, today: NaiveDate) -> Result<ValidatedRequest, BookingError> {
        let name = required("guest_name", &self.guest_name)?;
        let email = required("email", &self.email)?;
        let phone = required("phone", &self.phone)?;

        let check_in = parse_date("check_in", &self.check_in)?;
        let check_out = parse_date("check_out", &self.check_out)?;
        if check_out <= check_in {
            return Err(BookingError::validation(
                "check_out",
                "check-out must be after check-in",
            ));
        }
        if check_in < today {
            return Err(BookingError::validation(
                "check_in",
                "check-in cannot be in the past",
            ));
        }

        let guests = GuestCount::try_from(self.guests)
            .map_err(|reason| BookingError::validation("guests", reason))?;

        Ok(ValidatedRequest {
            check_in,
            check_out,
            guests,
            contact: GuestContact { name, email, phone },
            special_requests: self.special_requests.clone(),
        })
    }
}

/// A booking row from an external platform's calendar feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalBooking {
    pub external_uid: String,
    pub platform: String,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub guest_name: String,
}

/// Result of a calendar import attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum ImportOutcome {
    /// A new booking was created from the feed row
    Imported(Booking),
    /// The uid was already known; nothing was created
    Skipped { external_uid: String },
}

/// One row of the calendar export feed; confirmed stays only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEntry {
    pub id: BookingId,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub guest_name: String,
}

/// Aggregate counts for the admin dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardStats {
    pub total_bookings: usize,
    pub pending_bookings: usize,
    pub approved_bookings: usize,
    pub pending_payments: usize,
    pub paid_bookings: usize,
    pub total_revenue: Decimal,
}

/// Booking engine holding the booking store and the rate catalog.
///
/// # Invariants
///
/// - No two bookings outside {Rejected, Cancelled} ever occupy overlapping
///   `[check_in, check_out)` ranges, even under concurrent writers.
/// - Each external uid maps to at most one booking.
/// - Bookings change status only through the lifecycle tables; the one
///   exception is the logged, irreversible hard delete.
pub struct BookingEngine {
    bookings: RwLock<BTreeMap<BookingId, Booking>>,
    /// Import dedup index; reserved before a booking is stored
    external_uids: DashMap<String, BookingId>,
    next_id: AtomicU32,
    catalog: RateCatalog,
    notifier: Notifier,
}

impl BookingEngine {
    /// Creates an engine with an empty store, an empty catalog, and no
    /// notification channel attached.
    pub fn new() -> Self {
        BookingEngine {
            bookings: RwLock::new(BTreeMap::new()),
            external_uids: DashMap::new(),
            next_id: AtomicU32::new(1),
            catalog: RateCatalog::new(),
            notifier: Notifier::disabled(),
        }
    }

    /// Attaches a notification channel; events are dispatched after commits.
    #[must_use]
    pub fn with_notifier(mut self, sender: Sender<Notification>) -> Self {
        self.notifier = Notifier::new(sender);
        self
    }

    // === Guest operations ===

    /// Stores a new booking request.
    ///
    /// The conflict check and the insert run as one atomic unit; on success
    /// the booking is `Pending`/`Pending` with a creation-time priced total
    /// and a `BookingReceived` event is dispatched.
    ///
    /// # Errors
    ///
    /// - [`BookingError::Validation`] before any state is touched.
    /// - [`BookingError::NoRateAvailable`] when the stay cannot be priced.
    /// - [`BookingError::DateConflict`] naming the overlapping booking ids;
    ///   dates are never silently shifted.
    pub fn create_booking(
        &self,
        request: &BookingRequest,
        actor: &Actor,
    ) -> Result<Booking, BookingError> {
        let valid = request.validate(today())?;
        let quote = pricing::quote(&self.catalog, valid.check_in, valid.check_out, valid.guests)?;
        let booking =
            self.insert_booking(valid, quote.total, BookingSource::Direct, None, actor)?;

        tracing::info!(booking = %booking.id, nights = booking.nights(), "booking request stored");
        self.notifier.dispatch(Notification::BookingReceived {
            booking_id: booking.id,
            guest_name: booking.contact.name.clone(),
            guest_email: booking.contact.email.clone(),
            check_in: booking.check_in,
            check_out: booking.check_out,
            guests: booking.guests,
            total: booking.total,
        });
        Ok(booking)
    }

    /// Prices a stay without storing anything.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Validation`] for an inverted range, plus any
    /// resolver failure.
    pub fn quote(
        &self,
        check_in: NaiveDate,
        check_out: NaiveDate,
        guests: GuestCount,
    ) -> Result<Quote, BookingError> {
        if check_out <= check_in {
            return Err(BookingError::validation(
                "check_out",
                "check-out must be after check-in",
            ));
        }
        pricing::quote(&self.catalog, check_in, check_out, guests)
    }

    /// Occupied calendar days for a month, derived on demand.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Validation`] for an invalid year/month.
    pub fn availability(&self, year: i32, month: u32) -> Result<BTreeSet<NaiveDate>, BookingError> {
        let bookings = self.bookings.read();
        availability::occupied_dates(bookings.values(), year, month)
    }

    // === Staff operations ===

    /// Moves a booking to a new status.
    ///
    /// When `notify_guest` is set, a `StatusChanged` event is dispatched
    /// after the commit; a failed dispatch is logged and the transition
    /// stands.
    ///
    /// # Errors
    ///
    /// - [`BookingError::BookingNotFound`] for an unknown id.
    /// - [`BookingError::IllegalTransition`] for moves outside the table.
    pub fn transition_status(
        &self,
        id: BookingId,
        new_status: BookingStatus,
        actor: &Actor,
        note: Option<String>,
        notify_guest: bool,
    ) -> Result<Booking, BookingError> {
        let (booking, from) = {
            let mut bookings = self.bookings.write();
            let booking = bookings
                .get_mut(&id)
                .ok_or(BookingError::BookingNotFound { id })?;
            let from = booking.status;
            booking.transition_status(new_status, actor, note.clone())?;
            (booking.clone(), from)
        };

        tracing::info!(booking = %id, %from, to = %new_status, %actor, "booking status changed");
        if notify_guest {
            self.notifier.dispatch(Notification::StatusChanged {
                booking_id: booking.id,
                guest_name: booking.contact.name.clone(),
                guest_email: booking.contact.email.clone(),
                status: booking.status,
                check_in: booking.check_in,
                check_out: booking.check_out,
                note,
            });
        }
        Ok(booking)
    }

    /// Moves a booking's payment status and records payment metadata.
    ///
    /// # Errors
    ///
    /// - [`BookingError::BookingNotFound`] for an unknown id.
    /// - [`BookingError::IllegalPaymentTransition`] for moves outside the
    ///   payment table.
    /// - [`BookingError::PaymentOnRejected`] when a paid or partial payment
    ///   is attempted on a rejected booking.
    pub fn transition_payment(
        &self,
        id: BookingId,
        new_status: PaymentStatus,
        update: PaymentUpdate,
        actor: &Actor,
    ) -> Result<Booking, BookingError> {
        let booking = {
            let mut bookings = self.bookings.write();
            let booking = bookings
                .get_mut(&id)
                .ok_or(BookingError::BookingNotFound { id })?;
            booking.transition_payment(new_status, update, actor)?;
            booking.clone()
        };
        tracing::info!(booking = %id, payment = %new_status, %actor, "payment status changed");
        Ok(booking)
    }

    /// Moves a booking to new dates, re-pricing the stay at current rates.
    ///
    /// The conflict check excludes the booking itself, so shrinking or
    /// shifting within its own range is always allowed.
    ///
    /// # Errors
    ///
    /// - [`BookingError::Validation`] for an inverted range.
    /// - [`BookingError::BookingNotFound`] for an unknown id.
    /// - [`BookingError::DateConflict`] when another blocking booking
    ///   occupies part of the new range.
    pub fn update_booking_dates(
        &self,
        id: BookingId,
        check_in: NaiveDate,
        check_out: NaiveDate,
        actor: &Actor,
        note: Option<String>,
    ) -> Result<Booking, BookingError> {
        if check_out <= check_in {
            return Err(BookingError::validation(
                "check_out",
                "check-out must be after check-in",
            ));
        }

        let booking = {
            let mut bookings = self.bookings.write();
            let guests = bookings
                .get(&id)
                .ok_or(BookingError::BookingNotFound { id })?
                .guests;
            let conflicts =
                availability::conflicting_ids(bookings.values(), check_in, check_out, Some(id));
            if !conflicts.is_empty() {
                return Err(BookingError::DateConflict { ids: conflicts });
            }
            let quote = pricing::quote(&self.catalog, check_in, check_out, guests)?;
            let booking = bookings
                .get_mut(&id)
                .ok_or(BookingError::BookingNotFound { id })?;
            booking.reschedule(check_in, check_out, quote.total, actor, note);
            booking.clone()
        };
        tracing::info!(booking = %id, %actor, "booking dates changed");
        Ok(booking)
    }

    /// Hard-deletes a booking.
    ///
    /// This is the admin override path outside the state machine: always
    /// permitted, irreversible, and audit-logged. The uid index entry is
    /// released so a later import of the same uid creates a fresh record.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::BookingNotFound`] for an unknown id.
    pub fn delete_booking(&self, id: BookingId, actor: &Actor) -> Result<Booking, BookingError> {
        let booking = {
            let mut bookings = self.bookings.write();
            bookings
                .remove(&id)
                .ok_or(BookingError::BookingNotFound { id })?
        };
        if let Some(uid) = &booking.external_uid {
            self.external_uids.remove(uid);
        }
        tracing::warn!(booking = %id, %actor, status = %booking.status, "booking hard-deleted");
        Ok(booking)
    }

    /// Returns a booking by id.
    pub fn get_booking(&self, id: BookingId) -> Option<Booking> {
        self.bookings.read().get(&id).cloned()
    }

    /// Returns all bookings in id order.
    pub fn bookings(&self) -> Vec<Booking> {
        self.bookings.read().values().cloned().collect()
    }

    /// Aggregate dashboard counts.
    pub fn stats(&self) -> DashboardStats {
        let bookings = self.bookings.read();
        let mut stats = DashboardStats {
            total_bookings: bookings.len(),
            pending_bookings: 0,
            approved_bookings: 0,
            pending_payments: 0,
            paid_bookings: 0,
            total_revenue: Decimal::ZERO,
        };
        for booking in bookings.values() {
            match booking.status {
                BookingStatus::Pending => stats.pending_bookings += 1,
                BookingStatus::Approved => stats.approved_bookings += 1,
                _ => {}
            }
            match booking.payment_status {
                PaymentStatus::Pending => stats.pending_payments += 1,
                PaymentStatus::Paid => {
                    stats.paid_bookings += 1;
                    if let Some(amount) = booking.payment.amount {
                        stats.total_revenue += amount;
                    }
                }
                _ => {}
            }
        }
        stats
    }

    // === Rate administration ===

    /// Creates or updates a rate. See [`RateCatalog::upsert`].
    ///
    /// # Errors
    ///
    /// Propagates catalog validation and overlap failures.
    pub fn upsert_rate(&self, draft: RateDraft, actor: &Actor) -> Result<Rate, BookingError> {
        let rate = self.catalog.upsert(draft, actor)?;
        tracing::info!(rate = %rate.id, kind = %rate.kind, guests = %rate.guests, %actor, "rate upserted");
        Ok(rate)
    }

    /// Soft-deletes a rate. See [`RateCatalog::deactivate`].
    ///
    /// # Errors
    ///
    /// Propagates [`BookingError::LastBaseRate`] and
    /// [`BookingError::RateNotFound`].
    pub fn deactivate_rate(&self, id: RateId, actor: &Actor) -> Result<Rate, BookingError> {
        let rate = self.catalog.deactivate(id, actor)?;
        tracing::info!(rate = %id, %actor, "rate deactivated");
        Ok(rate)
    }

    /// Lists rates for the admin surface.
    pub fn rates(&self, filter: RateFilter) -> Vec<Rate> {
        self.catalog.rates(filter)
    }

    // === Calendar collaborator contracts ===

    /// Rows for the iCal export feed: approved and completed stays only.
    ///
    /// Pending requests are never exported; a request under review is not a
    /// confirmed stay.
    pub fn calendar_export(&self) -> Vec<CalendarEntry> {
        self.bookings
            .read()
            .values()
            .filter(|booking| {
                matches!(
                    booking.status,
                    BookingStatus::Approved | BookingStatus::Completed
                )
            })
            .map(|booking| CalendarEntry {
                id: booking.id,
                check_in: booking.check_in,
                check_out: booking.check_out,
                guest_name: booking.contact.name.clone(),
            })
            .collect()
    }

    /// Imports one row from an external platform feed.
    ///
    /// Deduplicates on the external uid: a known uid is reported as
    /// [`ImportOutcome::Skipped`], never created twice. New rows enter the
    /// normal lifecycle as `Pending` with the platform recorded as source.
    ///
    /// # Errors
    ///
    /// - [`BookingError::Validation`] for an empty uid or inverted range.
    /// - [`BookingError::DateConflict`] when the range is already occupied.
    /// - [`BookingError::NoRateAvailable`] when the stay cannot be priced.
    pub fn import_external(
        &self,
        import: &ExternalBooking,
        actor: &Actor,
    ) -> Result<ImportOutcome, BookingError> {
        if import.external_uid.trim().is_empty() {
            return Err(BookingError::validation("external_uid", "required"));
        }
        if import.check_out <= import.check_in {
            return Err(BookingError::validation(
                "check_out",
                "check-out must be after check-in",
            ));
        }

        let id = BookingId(self.next_id.fetch_add(1, Ordering::Relaxed));

        // Atomic check-and-reserve; the losing racer sees Occupied.
        match self.external_uids.entry(import.external_uid.clone()) {
            Entry::Occupied(_) => {
                return Ok(ImportOutcome::Skipped {
                    external_uid: import.external_uid.clone(),
                });
            }
            Entry::Vacant(entry) => {
                entry.insert(id);
            }
        }

        let valid = ValidatedRequest {
            check_in: import.check_in,
            check_out: import.check_out,
            guests: GuestCount::Two,
            contact: GuestContact {
                name: import.guest_name.clone(),
                email: format!("imported@{}.com", import.platform),
                phone: "n/a".to_string(),
            },
            special_requests: Some(format!(
                "Imported from {}. UID: {}",
                import.platform, import.external_uid
            )),
        };

        let result = pricing::quote(&self.catalog, valid.check_in, valid.check_out, valid.guests)
            .and_then(|quote| {
                self.insert_with_id(
                    id,
                    valid,
                    quote.total,
                    BookingSource::Platform(import.platform.clone()),
                    Some(import.external_uid.clone()),
                    actor,
                )
            });

        match result {
            Ok(booking) => {
                tracing::info!(booking = %booking.id, platform = %import.platform, "external booking imported");
                Ok(ImportOutcome::Imported(booking))
            }
            Err(error) => {
                // Release the reservation so a later retry can import.
                self.external_uids.remove(&import.external_uid);
                Err(error)
            }
        }
    }

    // === Internals ===

    fn insert_booking(
        &self,
        valid: ValidatedRequest,
        total: Decimal,
        source: BookingSource,
        external_uid: Option<String>,
        actor: &Actor,
    ) -> Result<Booking, BookingError> {
        let id = BookingId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.insert_with_id(id, valid, total, source, external_uid, actor)
    }

    fn insert_with_id(
        &self,
        id: BookingId,
        valid: ValidatedRequest,
        total: Decimal,
        source: BookingSource,
        external_uid: Option<String>,
        actor: &Actor,
    ) -> Result<Booking, BookingError> {
        let mut bookings = self.bookings.write();
        let conflicts = availability::conflicting_ids(
            bookings.values(),
            valid.check_in,
            valid.check_out,
            None,
        );
        if !conflicts.is_empty() {
            return Err(BookingError::DateConflict { ids: conflicts });
        }

        let booking = Booking::new(
            id,
            valid.check_in,
            valid.check_out,
            valid.guests,
            valid.contact,
            valid.special_requests,
            total,
            source,
            external_uid,
            actor,
        );
        bookings.insert(id, booking.clone());
        Ok(booking)
    }
}

impl Default for BookingEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

fn required(field: &'static str, value: &str) -> Result<String, BookingError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(BookingError::validation(field, "required"))
    } else {
        Ok(trimmed.to_string())
    }
}

fn parse_date(field: &'static str, value: &str) -> Result<NaiveDate, BookingError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| {
        BookingError::validation(field, format!("'{value}' is not a valid YYYY-MM-DD date"))
    })
}
