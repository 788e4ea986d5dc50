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

//! Booking records and their two lifecycle state machines.
//!
//! Booking status and payment status are independent machines coupled by a
//! single cross guard: a rejected booking cannot carry a payment.
//!
//  Pending ──approve──► Approved ──complete──► Completed
//     │                     │
//     └─reject─► Rejected   └─cancel─► Cancelled
//
//  Payment: Pending ──► {Partial, Paid, Cancelled}; Partial ──► {Paid,
//  Refunded}; Paid ──► Refunded

use crate::base::{BookingId, GuestCount};
use crate::error::BookingError;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Booking status states.
///
/// `Rejected`, `Cancelled`, and `Completed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    /// Guest request received, awaiting staff review
    Pending,
    /// Staff confirmed the stay; the range stays blocked
    Approved,
    /// Staff declined the request; the range is released
    Rejected,
    /// Approved stay called off; the range is released
    Cancelled,
    /// Stay took place
    Completed,
}

impl BookingStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Cancelled => "cancelled",
            Self::Completed => "completed",
        }
    }

    /// Returns true if this status is terminal (no further transitions).
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Rejected | Self::Cancelled | Self::Completed)
    }

    /// Returns true if a booking in this status occupies its date range.
    ///
    /// Rejected and cancelled bookings do not block the calendar.
    pub const fn blocks_calendar(&self) -> bool {
        !matches!(self, Self::Rejected | Self::Cancelled)
    }

    /// Validates a transition against the lifecycle table.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::IllegalTransition`] carrying both states when
    /// the move is not permitted.
    pub fn validate_transition(&self, new_status: Self) -> Result<(), BookingError> {
        let allowed = match self {
            Self::Pending => matches!(new_status, Self::Approved | Self::Rejected),
            Self::Approved => matches!(new_status, Self::Cancelled | Self::Completed),
            Self::Rejected | Self::Cancelled | Self::Completed => false,
        };

        if allowed {
            Ok(())
        } else {
            Err(BookingError::IllegalTransition {
                from: *self,
                to: new_status,
            })
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = BookingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            "cancelled" => Ok(Self::Cancelled),
            "completed" => Ok(Self::Completed),
            other => Err(BookingError::validation(
                "status",
                format!("unknown booking status '{other}'"),
            )),
        }
    }
}

/// Payment status states, independent of booking status.
///
/// `Refunded` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Partial,
    Paid,
    Refunded,
    Cancelled,
}

impl PaymentStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Partial => "partial",
            Self::Paid => "paid",
            Self::Refunded => "refunded",
            Self::Cancelled => "cancelled",
        }
    }

    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Refunded | Self::Cancelled)
    }

    /// Validates a transition against the payment table.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::IllegalPaymentTransition`] when the move is
    /// not permitted.
    pub fn validate_transition(&self, new_status: Self) -> Result<(), BookingError> {
        let allowed = match self {
            Self::Pending => matches!(new_status, Self::Partial | Self::Paid | Self::Cancelled),
            Self::Partial => matches!(new_status, Self::Paid | Self::Refunded),
            Self::Paid => matches!(new_status, Self::Refunded),
            Self::Refunded | Self::Cancelled => false,
        };

        if allowed {
            Ok(())
        } else {
            Err(BookingError::IllegalPaymentTransition {
                from: *self,
                to: new_status,
            })
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = BookingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "partial" => Ok(Self::Partial),
            "paid" => Ok(Self::Paid),
            "refunded" => Ok(Self::Refunded),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(BookingError::validation(
                "payment_status",
                format!("unknown payment status '{other}'"),
            )),
        }
    }
}

/// Where a booking came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingSource {
    /// Submitted through the public booking form
    Direct,
    /// Imported from an external platform calendar feed
    Platform(String),
}

impl fmt::Display for BookingSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct => f.write_str("direct"),
            Self::Platform(tag) => f.write_str(tag),
        }
    }
}

/// Resolved caller identity, as handed over by the auth collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Actor {
    /// Anonymous guest using the public form
    Guest,
    /// Authenticated staff user
    Staff { email: String },
    /// Trusted service client (calendar sync, batch import)
    Service { name: String },
}

impl Actor {
    pub fn staff(email: impl Into<String>) -> Self {
        Actor::Staff {
            email: email.into(),
        }
    }

    pub fn service(name: impl Into<String>) -> Self {
        Actor::Service { name: name.into() }
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Guest => f.write_str("guest"),
            Self::Staff { email } => f.write_str(email),
            Self::Service { name } => f.write_str(name),
        }
    }
}

/// A single recorded lifecycle change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryEvent {
    Status(BookingStatus),
    Payment(PaymentStatus),
    DatesChanged {
        check_in: NaiveDate,
        check_out: NaiveDate,
    },
}

/// Append-only history entry; the log is never rewritten.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub event: HistoryEvent,
    pub actor: Actor,
    pub at: DateTime<Utc>,
    pub note: Option<String>,
}

/// Guest contact details captured with the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestContact {
    pub name: String,
    pub email: String,
    pub phone: String,
}

/// Payment metadata recorded alongside payment transitions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub amount: Option<Decimal>,
    pub reference: Option<String>,
    pub method: Option<String>,
    /// Stamped the first time the payment reaches `Paid`
    pub paid_at: Option<DateTime<Utc>>,
}

/// Fields a payment transition may set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentUpdate {
    pub amount: Option<Decimal>,
    pub reference: Option<String>,
    pub method: Option<String>,
}

/// A reservation request and everything that happened to it.
///
/// Mutated only through the transition methods below; the engine hands out
/// clones, so holding a `Booking` never grants write access to stored state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub guests: GuestCount,
    pub contact: GuestContact,
    pub special_requests: Option<String>,
    pub status: BookingStatus,
    pub payment_status: PaymentStatus,
    /// Priced at creation; never recomputed when rates change later
    pub total: Decimal,
    pub payment: PaymentRecord,
    pub history: Vec<HistoryEntry>,
    pub source: BookingSource,
    pub external_uid: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// Creates a new booking in `Pending`/`Pending` with its first history
    /// entry appended.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: BookingId,
        check_in: NaiveDate,
        check_out: NaiveDate,
        guests: GuestCount,
        contact: GuestContact,
        special_requests: Option<String>,
        total: Decimal,
        source: BookingSource,
        external_uid: Option<String>,
        actor: &Actor,
    ) -> Self {
        let now = Utc::now();
        Booking {
            id,
            check_in,
            check_out,
            guests,
            contact,
            special_requests,
            status: BookingStatus::Pending,
            payment_status: PaymentStatus::Pending,
            total,
            payment: PaymentRecord::default(),
            history: vec![HistoryEntry {
                event: HistoryEvent::Status(BookingStatus::Pending),
                actor: actor.clone(),
                at: now,
                note: None,
            }],
            source,
            external_uid,
            created_at: now,
            updated_at: now,
        }
    }

    /// Number of nights in the stay.
    pub fn nights(&self) -> i64 {
        (self.check_out - self.check_in).num_days()
    }

    /// Returns true if this booking occupies its date range.
    pub fn blocks_calendar(&self) -> bool {
        self.status.blocks_calendar()
    }

    /// Moves the booking status, appending a history entry on success.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::IllegalTransition`] when the move is not in
    /// the lifecycle table; the history is untouched on failure.
    pub fn transition_status(
        &mut self,
        new_status: BookingStatus,
        actor: &Actor,
        note: Option<String>,
    ) -> Result<(), BookingError> {
        self.status.validate_transition(new_status)?;

        let now = Utc::now();
        self.status = new_status;
        self.updated_at = now;
        self.history.push(HistoryEntry {
            event: HistoryEvent::Status(new_status),
            actor: actor.clone(),
            at: now,
            note,
        });
        Ok(())
    }

    /// Moves the payment status and records payment metadata.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::IllegalPaymentTransition`] for moves outside
    /// the payment table, and [`BookingError::PaymentOnRejected`] when a
    /// paid or partial payment is attempted on a rejected booking.
    pub fn transition_payment(
        &mut self,
        new_status: PaymentStatus,
        update: PaymentUpdate,
        actor: &Actor,
    ) -> Result<(), BookingError> {
        self.payment_status.validate_transition(new_status)?;

        // Cross guard: the only coupling between the two machines.
        if matches!(new_status, PaymentStatus::Paid | PaymentStatus::Partial)
            && self.status == BookingStatus::Rejected
        {
            return Err(BookingError::PaymentOnRejected);
        }

        let now = Utc::now();
        self.payment_status = new_status;
        if update.amount.is_some() {
            self.payment.amount = update.amount;
        }
        if update.reference.is_some() {
            self.payment.reference = update.reference;
        }
        if update.method.is_some() {
            self.payment.method = update.method;
        }
        if new_status == PaymentStatus::Paid && self.payment.paid_at.is_none() {
            self.payment.paid_at = Some(now);
        }
        self.updated_at = now;
        self.history.push(HistoryEntry {
            event: HistoryEvent::Payment(new_status),
            actor: actor.clone(),
            at: now,
            note: None,
        });
        Ok(())
    }

    /// Replaces the stay dates and the priced total, appending a history
    /// entry. Conflict checking is the caller's responsibility; this method
    /// only records the already-validated change.
    pub(crate) fn reschedule(
        &mut self,
        check_in: NaiveDate,
        check_out: NaiveDate,
        total: Decimal,
        actor: &Actor,
        note: Option<String>,
    ) {
        let now = Utc::now();
        self.check_in = check_in;
        self.check_out = check_out;
        self.total = total;
        self.updated_at = now;
        self.history.push(HistoryEntry {
            event: HistoryEvent::DatesChanged {
                check_in,
                check_out,
            },
            actor: actor.clone(),
            at: now,
            note,
        });
    }
}
