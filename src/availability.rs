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

//! Calendar availability queries.
//!
//! Occupancy is half-open: a stay blocks every night from check-in up to
//! but excluding the check-out day, so a departure and an arrival may share
//! a calendar day. This is the single most failure-prone edge in date-range
//! booking and must hold in every query below.

use crate::base::BookingId;
use crate::booking::Booking;
use crate::error::BookingError;
use chrono::NaiveDate;
use std::collections::BTreeSet;

/// Returns true if the half-open ranges `[a_in, a_out)` and `[b_in, b_out)`
/// intersect.
pub fn ranges_overlap(
    a_in: NaiveDate,
    a_out: NaiveDate,
    b_in: NaiveDate,
    b_out: NaiveDate,
) -> bool {
    a_in < b_out && b_in < a_out
}

/// Expands every blocking booking intersecting the given month into the set
/// of occupied calendar days, clipped to the month.
///
/// The check-in day is included and the check-out day excluded.
///
/// # Errors
///
/// Returns [`BookingError::Validation`] for a month outside 1-12 or a year
/// the calendar cannot represent.
pub fn occupied_dates<'a, I>(
    bookings: I,
    year: i32,
    month: u32,
) -> Result<BTreeSet<NaiveDate>, BookingError>
where
    I: IntoIterator<Item = &'a Booking>,
{
    let (month_start, next_month_start) = month_bounds(year, month)?;

    let mut occupied = BTreeSet::new();
    for booking in bookings
        .into_iter()
        .filter(|booking| booking.blocks_calendar())
    {
        let from = booking.check_in.max(month_start);
        let until = booking.check_out.min(next_month_start);
        occupied.extend(from.iter_days().take_while(|day| *day < until));
    }
    Ok(occupied)
}

/// Returns the ids of blocking bookings whose occupied range intersects the
/// candidate `[check_in, check_out)` range.
///
/// `exclude` skips one booking, for date edits on an existing record.
pub fn conflicting_ids<'a, I>(
    bookings: I,
    check_in: NaiveDate,
    check_out: NaiveDate,
    exclude: Option<BookingId>,
) -> Vec<BookingId>
where
    I: IntoIterator<Item = &'a Booking>,
{
    bookings
        .into_iter()
        .filter(|booking| booking.blocks_calendar())
        .filter(|booking| Some(booking.id) != exclude)
        .filter(|booking| {
            ranges_overlap(booking.check_in, booking.check_out, check_in, check_out)
        })
        .map(|booking| booking.id)
        .collect()
}

/// First day of the month and first day of the following month.
fn month_bounds(year: i32, month: u32) -> Result<(NaiveDate, NaiveDate), BookingError> {
    let start = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| BookingError::validation("month", format!("invalid month {year}-{month}")))?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
    .ok_or_else(|| BookingError::validation("year", format!("invalid year {year}")))?;
    Ok((start, next))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::GuestCount;
    use crate::booking::{Actor, BookingSource, BookingStatus, GuestContact};
    use rust_decimal_macros::dec;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn booking(id: u32, check_in: &str, check_out: &str, status: BookingStatus) -> Booking {
        let mut booking = Booking::new(
            BookingId(id),
            d(check_in),
            d(check_out),
            GuestCount::Two,
            GuestContact {
                name: "Guest".to_string(),
                email: "guest@example.com".to_string(),
                phone: "000".to_string(),
            },
            None,
            dec!(950.00),
            BookingSource::Direct,
            None,
            &Actor::Guest,
        );
        // Drive the record into the wanted status through the machine.
        match status {
            BookingStatus::Pending => {}
            BookingStatus::Approved => {
                booking
                    .transition_status(BookingStatus::Approved, &Actor::Guest, None)
                    .unwrap();
            }
            BookingStatus::Rejected => {
                booking
                    .transition_status(BookingStatus::Rejected, &Actor::Guest, None)
                    .unwrap();
            }
            BookingStatus::Cancelled => {
                booking
                    .transition_status(BookingStatus::Approved, &Actor::Guest, None)
                    .unwrap();
                booking
                    .transition_status(BookingStatus::Cancelled, &Actor::Guest, None)
                    .unwrap();
            }
            BookingStatus::Completed => {
                booking
                    .transition_status(BookingStatus::Approved, &Actor::Guest, None)
                    .unwrap();
                booking
                    .transition_status(BookingStatus::Completed, &Actor::Guest, None)
                    .unwrap();
            }
        }
        booking
    }

    #[test]
    fn occupied_dates_exclude_checkout_day() {
        let bookings = vec![booking(1, "2025-07-01", "2025-07-04", BookingStatus::Approved)];
        let occupied = occupied_dates(&bookings, 2025, 7).unwrap();
        let expected = BTreeSet::from([d("2025-07-01"), d("2025-07-02"), d("2025-07-03")]);
        assert_eq!(occupied, expected);
    }

    #[test]
    fn occupied_dates_clip_to_month() {
        let bookings = vec![booking(1, "2025-06-28", "2025-07-03", BookingStatus::Approved)];

        let june = occupied_dates(&bookings, 2025, 6).unwrap();
        assert_eq!(
            june,
            BTreeSet::from([d("2025-06-28"), d("2025-06-29"), d("2025-06-30")])
        );

        let july = occupied_dates(&bookings, 2025, 7).unwrap();
        assert_eq!(july, BTreeSet::from([d("2025-07-01"), d("2025-07-02")]));
    }

    #[test]
    fn rejected_and_cancelled_do_not_occupy() {
        let bookings = vec![
            booking(1, "2025-07-01", "2025-07-04", BookingStatus::Rejected),
            booking(2, "2025-07-10", "2025-07-12", BookingStatus::Cancelled),
        ];
        assert!(occupied_dates(&bookings, 2025, 7).unwrap().is_empty());
    }

    #[test]
    fn pending_bookings_occupy() {
        let bookings = vec![booking(1, "2025-07-01", "2025-07-02", BookingStatus::Pending)];
        assert_eq!(
            occupied_dates(&bookings, 2025, 7).unwrap(),
            BTreeSet::from([d("2025-07-01")])
        );
    }

    #[test]
    fn december_rolls_into_next_year() {
        let bookings = vec![booking(1, "2025-12-30", "2026-01-02", BookingStatus::Approved)];
        assert_eq!(
            occupied_dates(&bookings, 2025, 12).unwrap(),
            BTreeSet::from([d("2025-12-30"), d("2025-12-31")])
        );
        assert_eq!(
            occupied_dates(&bookings, 2026, 1).unwrap(),
            BTreeSet::from([d("2026-01-01")])
        );
    }

    #[test]
    fn invalid_month_rejected() {
        let bookings: Vec<Booking> = Vec::new();
        assert!(matches!(
            occupied_dates(&bookings, 2025, 13),
            Err(BookingError::Validation { field: "month", .. })
        ));
        assert!(matches!(
            occupied_dates(&bookings, 2025, 0),
            Err(BookingError::Validation { field: "month", .. })
        ));
    }

    #[test]
    fn checkout_day_checkin_is_not_a_conflict() {
        let bookings = vec![booking(1, "2025-06-07", "2025-06-10", BookingStatus::Approved)];
        let conflicts = conflicting_ids(&bookings, d("2025-06-10"), d("2025-06-12"), None);
        assert!(conflicts.is_empty());
    }

    #[test]
    fn checkin_day_checkout_is_not_a_conflict() {
        let bookings = vec![booking(1, "2025-06-10", "2025-06-12", BookingStatus::Approved)];
        let conflicts = conflicting_ids(&bookings, d("2025-06-07"), d("2025-06-10"), None);
        assert!(conflicts.is_empty());
    }

    #[test]
    fn overlap_is_reported_with_ids() {
        let bookings = vec![
            booking(1, "2025-06-07", "2025-06-10", BookingStatus::Approved),
            booking(2, "2025-06-12", "2025-06-15", BookingStatus::Pending),
        ];
        let conflicts = conflicting_ids(&bookings, d("2025-06-09"), d("2025-06-13"), None);
        assert_eq!(conflicts, vec![BookingId(1), BookingId(2)]);
    }

    #[test]
    fn exclusion_skips_the_named_booking() {
        let bookings = vec![booking(1, "2025-06-07", "2025-06-10", BookingStatus::Approved)];
        let conflicts =
            conflicting_ids(&bookings, d("2025-06-08"), d("2025-06-11"), Some(BookingId(1)));
        assert!(conflicts.is_empty());
    }

    #[test]
    fn released_ranges_do_not_conflict() {
        let bookings = vec![booking(1, "2025-06-07", "2025-06-10", BookingStatus::Cancelled)];
        let conflicts = conflicting_ids(&bookings, d("2025-06-08"), d("2025-06-09"), None);
        assert!(conflicts.is_empty());
    }
}
