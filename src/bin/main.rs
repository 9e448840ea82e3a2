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

use chrono::NaiveDate;
use clap::Parser;
use csv::{ReaderBuilder, Trim, Writer};
use ppe_ledger::{
    BulkReport, Engine, LedgerConfig, LedgerError, RowFailure, StockBatch, StockMode, StockRow,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::PathBuf;
use std::process;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// PPE Ledger - Replay a CSV of stock movements and assignments
///
/// Reads movements grouped into submissions and prints the resulting stock
/// per variant to stdout. Rejected submissions are logged and skipped.
#[derive(Parser, Debug)]
#[command(name = "ppe-ledger")]
#[command(about = "Replays PPE stock movements and assignments from CSV", long_about = None)]
struct Args {
    /// Path to CSV file with movements
    ///
    /// Expected format: batch,mode,person,product,variant,quantity,renewal,date
    /// Example: cargo run -- movements.csv > stock.csv
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// JSON file overriding the default ledger configuration
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Also write the assignment register as CSV to this file
    #[arg(long, value_name = "OUT")]
    assignments: Option<PathBuf>,
}

fn main() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "ppe_ledger=info".into()),
        )
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => match LedgerConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                error!("Error loading config '{}': {}", path.display(), e);
                process::exit(1);
            }
        },
        None => LedgerConfig::default(),
    };

    let file = match File::open(&args.input) {
        Ok(f) => f,
        Err(e) => {
            error!("Error opening file '{}': {}", args.input.display(), e);
            process::exit(1);
        }
    };

    let engine = Engine::with_config(config);
    match replay(&engine, BufReader::new(file)) {
        Ok(summary) => info!(
            committed = summary.committed,
            rejected = summary.rejected,
            "replay finished"
        ),
        Err(e) => {
            error!("Error reading movements: {}", e);
            process::exit(1);
        }
    }

    if let Err(e) = write_stock(&engine, std::io::stdout()) {
        error!("Error writing output: {}", e);
        process::exit(1);
    }

    if let Some(path) = &args.assignments {
        let written = File::create(path)
            .map_err(csv::Error::from)
            .and_then(|file| write_assignments(&engine, file));
        if let Err(e) = written {
            error!("Error writing assignments '{}': {}", path.display(), e);
            process::exit(1);
        }
    }
}

/// Raw CSV record matching the input format.
///
/// Fields: `batch, mode, person, product, variant, quantity, renewal, date`
#[derive(Debug, Clone, Deserialize)]
struct CsvRecord {
    batch: String,
    mode: String,
    #[serde(default)]
    person: Option<String>,
    product: String,
    #[serde(default)]
    variant: Option<String>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    quantity: Option<u32>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    renewal: Option<u32>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    date: Option<NaiveDate>,
}

/// Kind of submission a batch of records forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Stock(StockMode),
    Assign,
}

impl Mode {
    fn parse(raw: &str) -> Option<Self> {
        match raw.to_lowercase().as_str() {
            "entry" => Some(Mode::Stock(StockMode::Entry)),
            "exit" => Some(Mode::Stock(StockMode::Exit)),
            "transit_out" => Some(Mode::Stock(StockMode::TransitOut)),
            "transit_return" => Some(Mode::Stock(StockMode::TransitReturn)),
            "assign" => Some(Mode::Assign),
            _ => None,
        }
    }
}

/// Outcome counts of a replay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub committed: usize,
    pub rejected: usize,
}

/// Replays movements from a CSV reader into the engine.
///
/// Consecutive records sharing a `batch` value form one submission, which
/// is committed or rejected as a whole. A malformed row rejects its
/// submission.
///
/// # CSV Format
///
/// Expected columns: `batch, mode, person, product, variant, quantity, renewal, date`
/// - `mode`: entry, exit, transit_out, transit_return or assign
/// - `person`: recipient, assign mode only
/// - `renewal`: renewal period in months, assign mode only
/// - `date`: `YYYY-MM-DD`, taken from the first record of the batch
///
/// # Example
///
/// ```csv
/// batch,mode,person,product,variant,quantity,renewal,date
/// 1,entry,,Helmet,Standard,10,,2025-06-01
/// 2,assign,Ana,Helmet,Standard,2,12,2025-06-01
/// 2,assign,Luis,Helmet,Standard,2,,2025-06-01
/// ```
///
/// # Errors
///
/// Returns a CSV error if the reader fails. Rejected submissions are logged
/// and counted but don't stop processing.
pub fn replay<R: Read>(engine: &Engine, reader: R) -> Result<ReplaySummary, csv::Error> {
    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .has_headers(true)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    let batch_column = headers.iter().position(|h| h == "batch");

    let mut summary = ReplaySummary::default();
    let mut pending = Pending::default();
    for result in rdr.records() {
        let raw = match result {
            Ok(raw) => raw,
            Err(e) if e.is_io_error() => return Err(e),
            Err(e) => {
                warn!("Malformed row: {}", e);
                pending.malformed += 1;
                continue;
            }
        };
        let batch = batch_column.and_then(|i| raw.get(i)).unwrap_or_default();
        if pending.batch.as_deref().is_some_and(|current| current != batch) {
            pending.submit(engine, &mut summary);
        }
        pending.batch.get_or_insert_with(|| batch.to_string());
        match raw.deserialize::<CsvRecord>(Some(&headers)) {
            Ok(record) => pending.records.push(record),
            Err(e) => {
                warn!(batch, "Malformed row: {}", e);
                pending.malformed += 1;
            }
        }
    }
    pending.submit(engine, &mut summary);

    Ok(summary)
}

/// Records of the submission being read.
///
/// A submission containing a malformed row is rejected whole.
#[derive(Default)]
struct Pending {
    batch: Option<String>,
    records: Vec<CsvRecord>,
    malformed: usize,
}

impl Pending {
    fn submit(&mut self, engine: &Engine, summary: &mut ReplaySummary) {
        let records = std::mem::take(&mut self.records);
        let malformed = std::mem::take(&mut self.malformed);
        let Some(batch) = self.batch.take() else {
            if malformed > 0 {
                summary.rejected += 1;
            }
            return;
        };
        if malformed > 0 {
            summary.rejected += 1;
            warn!(batch = %batch, malformed, "Skipping submission with malformed rows");
            return;
        }
        submit(engine, &batch, &records, summary);
    }
}

fn submit(engine: &Engine, batch: &str, records: &[CsvRecord], summary: &mut ReplaySummary) {
    match commit(engine, records) {
        Ok(()) => summary.committed += 1,
        Err(report) => {
            summary.rejected += 1;
            warn!(batch, "Skipping submission: {}", report);
            for failure in &report.failures {
                warn!(batch, "  {}", failure);
            }
        }
    }
}

fn rejection(error: LedgerError) -> BulkReport {
    BulkReport {
        failures: vec![RowFailure {
            rows: Vec::new(),
            error,
        }],
    }
}

fn commit(engine: &Engine, records: &[CsvRecord]) -> Result<(), BulkReport> {
    let first = records
        .first()
        .ok_or_else(|| rejection(LedgerError::ValidationIncomplete { field: "rows" }))?;
    let mode = Mode::parse(&first.mode)
        .filter(|mode| records.iter().all(|r| Mode::parse(&r.mode) == Some(*mode)))
        .ok_or_else(|| rejection(LedgerError::ValidationIncomplete { field: "mode" }))?;
    let date = first
        .date
        .ok_or_else(|| rejection(LedgerError::ValidationIncomplete { field: "date" }))?;

    match mode {
        Mode::Stock(mode) => {
            let batch = StockBatch {
                mode,
                date,
                rows: records
                    .iter()
                    .map(|r| {
                        StockRow::new(
                            r.product.clone(),
                            r.variant.clone().unwrap_or_default(),
                            r.quantity.unwrap_or_default(),
                        )
                    })
                    .collect(),
            };
            engine.commit_stock_batch(&batch).map(|_| ())
        }
        Mode::Assign => {
            if records.iter().any(|r| r.product != first.product) {
                return Err(rejection(LedgerError::ValidationIncomplete { field: "product" }));
            }
            let people = recipients(records)?;
            let mut plan = engine
                .plan_assignment(&first.product, people.iter().map(|(person, _)| person))
                .map_err(rejection)?;
            for (person, record) in people {
                if let Some(variant) = record.variant.as_deref().filter(|v| !v.is_empty()) {
                    plan.set_variant(person, variant);
                }
                plan.set_quantity(person, record.quantity.unwrap_or_default());
                plan.set_renewal(person, record.renewal);
            }
            engine.commit_assignment(&plan, date).map(|_| ())
        }
    }
}

/// Pairs each assign record with its person.
///
/// Every record must name a distinct person; a plan holds one row per
/// person, so a repeated name would overwrite the earlier row.
fn recipients(records: &[CsvRecord]) -> Result<Vec<(&str, &CsvRecord)>, BulkReport> {
    let mut report = BulkReport::default();
    let mut rows: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    let mut people = Vec::with_capacity(records.len());
    for (index, record) in records.iter().enumerate() {
        match record.person.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
            Some(person) => {
                rows.entry(person).or_default().push(index);
                people.push((person, record));
            }
            None => report.push(vec![index], LedgerError::ValidationIncomplete { field: "person" }),
        }
    }
    for (person, rows) in rows {
        if rows.len() > 1 {
            report.push(rows, LedgerError::DuplicateRecipient(person.to_string()));
        }
    }
    report.into_result()?;
    Ok(people)
}

/// Output row of the stock table.
#[derive(Debug, Serialize)]
struct StockRecord<'a> {
    product: &'a str,
    variant: &'a str,
    on_hand: u32,
    in_transit: u32,
    min_stock: u32,
}

/// Write stock levels per variant to a CSV writer.
///
/// # CSV Format
///
/// Columns: `product, variant, on_hand, in_transit, min_stock`
///
/// # Errors
///
/// Returns a CSV error if writing fails.
pub fn write_stock<W: Write>(engine: &Engine, writer: W) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);

    for product in engine.products() {
        for variant in &product.variants {
            wtr.serialize(StockRecord {
                product: &product.name,
                variant: &variant.name,
                on_hand: variant.on_hand,
                in_transit: variant.in_transit,
                min_stock: variant.min_stock,
            })?;
        }
    }

    wtr.flush()?;
    Ok(())
}

/// Output row of the register.
#[derive(Debug, Serialize)]
struct AssignmentRecord<'a> {
    id: u32,
    person: &'a str,
    equipment: &'a str,
    category: &'a str,
    date: NaiveDate,
    quantity: u32,
    renewal: Option<NaiveDate>,
}

/// Write the assignment register to a CSV writer.
///
/// Columns: `id, person, equipment, category, date, quantity, renewal`
pub fn write_assignments<W: Write>(engine: &Engine, writer: W) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);

    for entry in engine.assignments() {
        wtr.serialize(AssignmentRecord {
            id: entry.id.0,
            person: entry.recipient.label(),
            equipment: &entry.equipment,
            category: &entry.category,
            date: entry.assignment_date,
            quantity: entry.quantity,
            renewal: entry.renewal_date,
        })?;
    }

    wtr.flush()?;
    Ok(())
}
