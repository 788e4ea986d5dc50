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

//! Core identifier types for bookings, rates, and guest counts.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a booking.
///
/// Wraps a `u32`; identifiers are allocated sequentially by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(transparent)]
pub struct BookingId(pub u32);

impl fmt::Display for BookingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a rate record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(transparent)]
pub struct RateId(pub u32);

impl fmt::Display for RateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Number of guests for a stay.
///
/// The property sleeps at most two guests, so any other count is
/// unrepresentable past the validation boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum GuestCount {
    One,
    Two,
}

impl GuestCount {
    pub const ALL: [GuestCount; 2] = [GuestCount::One, GuestCount::Two];

    pub const fn as_u8(self) -> u8 {
        match self {
            GuestCount::One => 1,
            GuestCount::Two => 2,
        }
    }
}

impl TryFrom<u8> for GuestCount {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(GuestCount::One),
            2 => Ok(GuestCount::Two),
            other => Err(format!("guest count must be 1 or 2, got {other}")),
        }
    }
}

impl From<GuestCount> for u8 {
    fn from(value: GuestCount) -> Self {
        value.as_u8()
    }
}

impl fmt::Display for GuestCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u8())
    }
}
