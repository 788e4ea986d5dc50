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

//! Guest notification events.
//!
//! Notifications are emitted as messages on a channel after a state change
//! has committed; the booking record is the source of truth, not the email.
//! A failed dispatch is logged and never rolls back the committed change.

use crate::base::{BookingId, GuestCount};
use crate::booking::BookingStatus;
use chrono::NaiveDate;
use crossbeam::channel::Sender;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// An event the external mailer turns into an email.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    /// A new booking request was stored; confirms receipt to the guest and
    /// alerts the owner.
    BookingReceived {
        booking_id: BookingId,
        guest_name: String,
        guest_email: String,
        check_in: NaiveDate,
        check_out: NaiveDate,
        guests: GuestCount,
        total: Decimal,
    },
    /// A booking moved to a new status and the caller asked for the guest
    /// to be told.
    StatusChanged {
        booking_id: BookingId,
        guest_name: String,
        guest_email: String,
        status: BookingStatus,
        check_in: NaiveDate,
        check_out: NaiveDate,
        note: Option<String>,
    },
}

/// Fire-and-forget dispatcher over a crossbeam channel.
///
/// The receiving end belongs to the external mailer; a disconnected or full
/// channel is a delivery problem, not a booking problem.
#[derive(Debug, Clone, Default)]
pub struct Notifier {
    sender: Option<Sender<Notification>>,
}

impl Notifier {
    /// A notifier that drops every event; used when no mailer is attached.
    pub fn disabled() -> Self {
        Notifier { sender: None }
    }

    pub fn new(sender: Sender<Notification>) -> Self {
        Notifier {
            sender: Some(sender),
        }
    }

    /// Dispatches an event without blocking.
    pub(crate) fn dispatch(&self, notification: Notification) {
        let Some(sender) = &self.sender else {
            return;
        };
        if let Err(error) = sender.try_send(notification) {
            tracing::warn!(%error, "dropping guest notification");
        }
    }
}
