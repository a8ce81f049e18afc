//! Pipeline input file format.
//!
//! The geocoding stage reads a comma-separated file with one depot row
//! followed by one row per stop. The vehicle count lives in a separate
//! single-line file.

use std::path::Path;

use tracing::debug;

use super::{Address, DeliveryRequest, DeliveryStop};
use crate::config::PathConfig;
use crate::errors::{FileProcessingError, Result};

/// Header row of the pipeline input file.
pub const INPUT_HEADER: &str = "Typ,Ulica,Numer,Miasto,KodPocztowy,OknoCzasoweOd,OknoCzasoweDo";

/// Row type of the depot row.
pub const DEPOT_ROW_TYPE: &str = "Magazyn";

/// Row type of a delivery stop row.
pub const STOP_ROW_TYPE: &str = "PunktDostawy";

/// Key of the vehicle-count line.
pub const VEHICLE_COUNT_KEY: &str = "LiczbaPojazdow";

/// Renders the pipeline input file.
#[must_use]
pub fn render_input_csv(request: &DeliveryRequest) -> String {
    let mut out = String::with_capacity(128 + request.stops.len() * 64);
    out.push_str(INPUT_HEADER);
    out.push('\n');

    let depot = &request.depot;
    push_row(
        &mut out,
        &[
            DEPOT_ROW_TYPE,
            &depot.street,
            &depot.number,
            &depot.city,
            &depot.postal_code,
            "",
            "",
        ],
    );

    for stop in &request.stops {
        let a = &stop.address;
        push_row(
            &mut out,
            &[
                STOP_ROW_TYPE,
                &a.street,
                &a.number,
                &a.city,
                &a.postal_code,
                &stop.window_start,
                &stop.window_end,
            ],
        );
    }
    out
}

/// Renders the vehicle-count file.
#[must_use]
pub fn render_vehicle_count(vehicle_count: u32) -> String {
    format!("{VEHICLE_COUNT_KEY},{vehicle_count}\n")
}

fn push_row(out: &mut String, fields: &[&str]) {
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        push_field(out, field);
    }
    out.push('\n');
}

fn push_field(out: &mut String, field: &str) {
    if field.contains([',', '"', '\n', '\r']) {
        out.push('"');
        out.push_str(&field.replace('"', "\"\""));
        out.push('"');
    } else {
        out.push_str(field);
    }
}

/// Writes the pipeline input file, creating parent directories.
pub async fn write_input_csv(
    path: impl AsRef<Path>,
    request: &DeliveryRequest,
) -> std::result::Result<(), FileProcessingError> {
    write_file(path.as_ref(), render_input_csv(request)).await
}

/// Writes the vehicle-count file, creating parent directories.
pub async fn write_vehicle_count(
    path: impl AsRef<Path>,
    vehicle_count: u32,
) -> std::result::Result<(), FileProcessingError> {
    write_file(path.as_ref(), render_vehicle_count(vehicle_count)).await
}

async fn write_file(path: &Path, contents: String) -> std::result::Result<(), FileProcessingError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| FileProcessingError::io(parent, "Nie udało się utworzyć katalogu", e))?;
    }
    tokio::fs::write(path, contents)
        .await
        .map_err(|e| FileProcessingError::io(path, "Nie udało się zapisać pliku", e))
}

/// Parses a previously exported input file back into a request.
///
/// The input file does not carry the vehicle count, so the caller supplies
/// it. Rows of unknown type are skipped.
pub fn read_input_csv(
    contents: &str,
    vehicle_count: u32,
    source: impl AsRef<Path>,
) -> std::result::Result<DeliveryRequest, FileProcessingError> {
    let source = source.as_ref();
    let mut depot = None;
    let mut stops = Vec::new();

    for (line, record) in parse_records(contents).into_iter().enumerate() {
        let kind = record.first().map_or("", |s| s.trim());
        match kind {
            "Typ" if line == 0 => {}
            DEPOT_ROW_TYPE | STOP_ROW_TYPE => {
                if record.len() < 5 {
                    return Err(FileProcessingError::new(
                        source,
                        format!("Niepełny wiersz {} w pliku danych", line + 1),
                    ));
                }
                let address = Address::new(
                    record[1].clone(),
                    record[2].clone(),
                    record[3].clone(),
                    record[4].clone(),
                );
                if kind == DEPOT_ROW_TYPE {
                    depot = Some(address);
                } else {
                    stops.push(DeliveryStop::new(address).with_window(
                        record.get(5).cloned().unwrap_or_default(),
                        record.get(6).cloned().unwrap_or_default(),
                    ));
                }
            }
            other => debug!(row = line + 1, kind = %other, "Skipping unknown input row"),
        }
    }

    let depot = depot
        .ok_or_else(|| FileProcessingError::new(source, "Brak wiersza magazynu w pliku danych"))?;
    Ok(DeliveryRequest {
        depot,
        vehicle_count,
        stops,
    })
}

/// Parses the vehicle-count file. Returns `None` if the line is malformed.
#[must_use]
pub fn read_vehicle_count(contents: &str) -> Option<u32> {
    let line = contents.lines().next()?.trim();
    let (key, value) = line.split_once(',')?;
    if key.trim_start_matches('\u{feff}') != VEHICLE_COUNT_KEY {
        return None;
    }
    value.trim().parse().ok()
}

/// Loads a request from an input file and an optional vehicle-count file.
///
/// A missing or malformed vehicle-count file yields one vehicle.
pub async fn load_request(
    data_path: impl AsRef<Path>,
    config_path: Option<&Path>,
) -> Result<DeliveryRequest> {
    let data_path = data_path.as_ref();
    let contents = tokio::fs::read_to_string(data_path)
        .await
        .map_err(|e| FileProcessingError::io(data_path, "Nie udało się odczytać pliku", e))?;

    let vehicle_count = match config_path {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .ok()
            .and_then(|c| read_vehicle_count(&c))
            .unwrap_or(1),
        None => 1,
    };

    Ok(read_input_csv(&contents, vehicle_count, data_path)?)
}

/// What the last export contains, read back from disk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct InputSummary {
    /// Vehicle count from the vehicle-count file, if readable.
    pub vehicle_count: Option<u32>,
    /// Number of stop rows in the input file.
    pub delivery_point_count: usize,
}

impl InputSummary {
    /// Reads the summary from the configured files. Missing files count as empty.
    pub async fn load(paths: &PathConfig) -> Self {
        let vehicle_count = tokio::fs::read_to_string(paths.config_file_path())
            .await
            .ok()
            .and_then(|c| read_vehicle_count(&c));

        let delivery_point_count = tokio::fs::read_to_string(paths.data_file_path())
            .await
            .map(|c| {
                parse_records(&c)
                    .iter()
                    .filter(|r| r.first().is_some_and(|t| t.trim() == STOP_ROW_TYPE))
                    .count()
            })
            .unwrap_or(0);

        Self {
            vehicle_count,
            delivery_point_count,
        }
    }
}

/// Splits CSV text into records. Handles quoted fields, doubled quotes,
/// CRLF line endings and a leading BOM. Blank lines are dropped.
fn parse_records(contents: &str) -> Vec<Vec<String>> {
    let contents = contents.strip_prefix('\u{feff}').unwrap_or(contents);
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = contents.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    field.push('"');
                    chars.next();
                }
                '"' => in_quotes = false,
                _ => field.push(c),
            }
            continue;
        }
        match c {
            '"' if field.is_empty() => in_quotes = true,
            ',' => record.push(std::mem::take(&mut field)),
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' => {
                record.push(std::mem::take(&mut field));
                records.push(std::mem::take(&mut record));
            }
            _ => field.push(c),
        }
    }
    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        records.push(record);
    }

    records.retain(|r| !(r.len() == 1 && r[0].is_empty()));
    records
}
