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

use booking_engine_rs::{
    Actor, BookingEngine, BookingRequest, GuestCount, RateDraft, RateKind,
};
use chrono::NaiveDate;
use clap::Parser;
use csv::{ReaderBuilder, Trim, Writer};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::PathBuf;
use std::process;

/// Booking Engine - Replay booking request CSV files
///
/// Seeds the rate catalog from a rates CSV, replays booking requests from a
/// bookings CSV, and outputs the resulting booking states to stdout.
#[derive(Parser, Debug)]
#[command(name = "booking-engine-rs")]
#[command(about = "A booking engine that replays rate and booking CSVs", long_about = None)]
struct Args {
    /// Path to CSV file with rates
    ///
    /// Expected format: kind,guests,amount,start_date,end_date,description
    #[arg(value_name = "RATES")]
    rates: PathBuf,

    /// Path to CSV file with booking requests
    ///
    /// Expected format: checkin,checkout,guests,name,email,phone,message
    #[arg(value_name = "BOOKINGS")]
    bookings: PathBuf,
}

fn main() {
    let args = Args::parse();

    let rates_file = match File::open(&args.rates) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Error opening file '{}': {}", args.rates.display(), e);
            process::exit(1);
        }
    };
    let bookings_file = match File::open(&args.bookings) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Error opening file '{}': {}", args.bookings.display(), e);
            process::exit(1);
        }
    };

    let engine = BookingEngine::new();

    if let Err(e) = seed_rates(&engine, BufReader::new(rates_file)) {
        eprintln!("Error reading rates: {}", e);
        process::exit(1);
    }
    if let Err(e) = replay_bookings(&engine, BufReader::new(bookings_file)) {
        eprintln!("Error processing bookings: {}", e);
        process::exit(1);
    }

    if let Err(e) = write_bookings(&engine, std::io::stdout()) {
        eprintln!("Error writing output: {}", e);
        process::exit(1);
    }
}

/// Raw CSV record for a rate row.
///
/// Fields: `kind, guests, amount, start_date, end_date, description`
#[derive(Debug, Deserialize)]
struct RateCsvRecord {
    kind: String,
    guests: u8,
    #[serde(deserialize_with = "csv::invalid_option")]
    amount: Option<Decimal>,
    start_date: Option<String>,
    end_date: Option<String>,
    description: Option<String>,
}

impl RateCsvRecord {
    /// Converts the CSV record into a rate draft.
    ///
    /// Returns `None` for an invalid kind, guest count, amount, or date.
    fn into_draft(self) -> Option<RateDraft> {
        let kind: RateKind = self.kind.to_lowercase().parse().ok()?;
        let guests = GuestCount::try_from(self.guests).ok()?;
        let amount = self.amount?;
        let start_date = match self.start_date.as_deref().filter(|s| !s.is_empty()) {
            Some(s) => Some(NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()?),
            None => None,
        };
        let end_date = match self.end_date.as_deref().filter(|s| !s.is_empty()) {
            Some(s) => Some(NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()?),
            None => None,
        };
        Some(RateDraft {
            id: None,
            kind,
            guests,
            amount_per_night: amount,
            start_date,
            end_date,
            description: self.description.filter(|s| !s.is_empty()),
        })
    }
}

/// Raw CSV record for a booking request row.
///
/// Fields: `checkin, checkout, guests, name, email, phone, message`
#[derive(Debug, Deserialize)]
struct BookingCsvRecord {
    checkin: String,
    checkout: String,
    guests: u8,
    name: String,
    email: String,
    phone: String,
    message: Option<String>,
}

impl BookingCsvRecord {
    fn into_request(self) -> BookingRequest {
        BookingRequest {
            check_in: self.checkin,
            check_out: self.checkout,
            guests: self.guests,
            guest_name: self.name,
            email: self.email,
            phone: self.phone,
            special_requests: self.message.filter(|s| !s.is_empty()),
        }
    }
}

/// Output row for a stored booking.
#[derive(Debug, Serialize)]
struct BookingCsvOut {
    id: u32,
    check_in: NaiveDate,
    check_out: NaiveDate,
    guests: u8,
    status: String,
    payment_status: String,
    total: Decimal,
}

/// Seed the rate catalog from a CSV reader.
///
/// Malformed rows and rejected rates (overlaps, bad amounts) are skipped;
/// replay continues. Returns a CSV error only when the reader itself fails.
///
/// # Example
///
/// ```csv
/// kind,guests,amount,start_date,end_date,description
/// base,2,950.00,,,
/// special,2,800.00,2025-12-20,2025-12-24,festive special
/// ```
fn seed_rates<R: Read>(engine: &BookingEngine, reader: R) -> Result<(), csv::Error> {
    let actor = Actor::service("csv-import");
    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .has_headers(true)
        .from_reader(reader);

    for result in rdr.deserialize::<RateCsvRecord>() {
        match result {
            Ok(record) => {
                let Some(draft) = record.into_draft() else {
                    #[cfg(debug_assertions)]
                    eprintln!("Skipping invalid rate record");
                    continue;
                };
                if let Err(e) = engine.upsert_rate(draft, &actor) {
                    #[cfg(debug_assertions)]
                    eprintln!("Skipping rate: {}", e);
                }
            }
            Err(e) => {
                #[cfg(debug_assertions)]
                eprintln!("Skipping malformed rate row: {}", e);
                continue;
            }
        }
    }
    Ok(())
}

/// Replay booking requests from a CSV reader.
///
/// Requests that fail validation, pricing, or conflict checking are skipped
/// with the engine's state untouched, matching the engine's atomicity rules.
fn replay_bookings<R: Read>(engine: &BookingEngine, reader: R) -> Result<(), csv::Error> {
    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .has_headers(true)
        .from_reader(reader);

    for result in rdr.deserialize::<BookingCsvRecord>() {
        match result {
            Ok(record) => {
                let request = record.into_request();
                if let Err(e) = engine.create_booking(&request, &Actor::Guest) {
                    #[cfg(debug_assertions)]
                    eprintln!("Skipping booking: {}", e);
                }
            }
            Err(e) => {
                #[cfg(debug_assertions)]
                eprintln!("Skipping malformed booking row: {}", e);
                continue;
            }
        }
    }
    Ok(())
}

/// Write stored bookings to a CSV writer with totals at 2 decimal places.
///
/// # CSV Format
///
/// Columns: `id, check_in, check_out, guests, status, payment_status, total`
fn write_bookings<W: Write>(engine: &BookingEngine, writer: W) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);

    for booking in engine.bookings() {
        wtr.serialize(BookingCsvOut {
            id: booking.id.0,
            check_in: booking.check_in,
            check_out: booking.check_out,
            guests: booking.guests.as_u8(),
            status: booking.status.as_str().to_string(),
            payment_status: booking.payment_status.as_str().to_string(),
            total: booking.total.round_dp(2),
        })?;
    }

    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::io::Cursor;

    const RATES: &str = "kind,guests,amount,start_date,end_date,description\n\
                         base,1,750.00,,,\n\
                         base,2,950.00,,,\n";

    fn seeded_engine() -> BookingEngine {
        let engine = BookingEngine::new();
        seed_rates(&engine, Cursor::new(RATES)).unwrap();
        engine
    }

    #[test]
    fn seed_and_replay_single_booking() {
        let engine = seeded_engine();
        let csv = "checkin,checkout,guests,name,email,phone,message\n\
                   2099-07-01,2099-07-04,2,Thandi,t@example.com,063 000 0000,\n";
        replay_bookings(&engine, Cursor::new(csv)).unwrap();

        let bookings = engine.bookings();
        assert_eq!(bookings.len(), 1);
        assert_eq!(bookings[0].total, dec!(2850.00));
    }

    #[test]
    fn conflicting_rows_are_skipped() {
        let engine = seeded_engine();
        let csv = "checkin,checkout,guests,name,email,phone,message\n\
                   2099-07-01,2099-07-04,2,First,a@example.com,000,\n\
                   2099-07-02,2099-07-05,1,Second,b@example.com,000,\n";
        replay_bookings(&engine, Cursor::new(csv)).unwrap();

        assert_eq!(engine.bookings().len(), 1);
    }

    #[test]
    fn malformed_rows_are_skipped() {
        let engine = seeded_engine();
        let csv = "checkin,checkout,guests,name,email,phone,message\n\
                   not-a-date,2099-07-04,2,Bad,b@example.com,000,\n\
                   2099-08-01,2099-08-03,2,Good,g@example.com,000,\n";
        replay_bookings(&engine, Cursor::new(csv)).unwrap();

        let bookings = engine.bookings();
        assert_eq!(bookings.len(), 1);
        assert_eq!(bookings[0].contact.name, "Good");
    }

    #[test]
    fn overlapping_special_rate_rows_are_skipped() {
        let engine = BookingEngine::new();
        let csv = "kind,guests,amount,start_date,end_date,description\n\
                   special,2,800.00,2025-12-20,2025-12-24,festive\n\
                   special,2,700.00,2025-12-22,2025-12-26,clashing\n";
        seed_rates(&engine, Cursor::new(csv)).unwrap();

        assert_eq!(
            engine
                .rates(booking_engine_rs::RateFilter::default())
                .len(),
            1
        );
    }

    #[test]
    fn output_contains_headers_and_totals() {
        let engine = seeded_engine();
        let csv = "checkin,checkout,guests,name,email,phone,message\n\
                   2099-07-01,2099-07-03,1,Thandi,t@example.com,000,\n";
        replay_bookings(&engine, Cursor::new(csv)).unwrap();

        let mut output = Vec::new();
        write_bookings(&engine, &mut output).unwrap();
        let output = String::from_utf8(output).unwrap();

        assert!(output.contains("id,check_in,check_out,guests,status,payment_status,total"));
        assert!(output.contains("1500.00"));
        assert!(output.contains("pending"));
    }
}
