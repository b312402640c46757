// CSV/TSV import of report exports, CSV export of report views

use std::io::Write;

use vpn_recon::{CellValue, RawSheet, ReconError, TabularView};

/// Parse delimited text into a raw sheet. Every non-empty field becomes text;
/// typing happens later, per field, in the sheet parser.
pub fn read_sheet(source: &str, bytes: &[u8]) -> Result<RawSheet, ReconError> {
    let decoded = decode_utf8(bytes);
    let content = decoded.strip_prefix('\u{feff}').unwrap_or(&decoded);
    let delimiter = sniff_delimiter(content);
    read_with_delimiter(source, content, delimiter)
}

/// Detect the most likely field delimiter by checking consistency across the first few lines.
///
/// For each candidate (tab, semicolon, comma, pipe), count fields per line. The delimiter
/// that produces the most consistent field count (>1 field) wins.
fn sniff_delimiter(content: &str) -> u8 {
    let candidates: &[u8] = &[b'\t', b';', b',', b'|'];
    let sample_lines: Vec<&str> = content
        .lines()
        .filter(|l| !l.trim().is_empty())
        .take(10)
        .collect();

    if sample_lines.is_empty() {
        return b',';
    }

    let mut best = b',';
    let mut best_score = 0u64;

    for &delim in candidates {
        let counts: Vec<usize> = sample_lines
            .iter()
            .map(|line| {
                csv::ReaderBuilder::new()
                    .delimiter(delim)
                    .has_headers(false)
                    .flexible(true)
                    .from_reader(line.as_bytes())
                    .records()
                    .next()
                    .and_then(|r| r.ok())
                    .map(|r| r.len())
                    .unwrap_or(1)
            })
            .collect();

        // Banner rows above the header often hold a single field, so score on
        // the widest line rather than the first one.
        let target = counts.iter().copied().max().unwrap_or(0);
        if target <= 1 {
            continue;
        }

        let consistent = counts.iter().filter(|&&c| c == target).count() as u64;
        let score = consistent * target as u64;

        if score > best_score {
            best_score = score;
            best = delim;
        }
    }

    best
}

/// UTF-8 if valid, otherwise Windows-1252 (what Excel writes for "CSV" on Spanish locales).
pub fn decode_utf8(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            decoded.into_owned()
        }
    }
}

fn read_with_delimiter(source: &str, content: &str, delimiter: u8) -> Result<RawSheet, ReconError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| ReconError::InputFormat {
            source_name: source.to_string(),
            reason: e.to_string(),
        })?;
        rows.push(
            record
                .iter()
                .map(|field| {
                    if field.is_empty() {
                        CellValue::Empty
                    } else {
                        CellValue::Text(field.to_string())
                    }
                })
                .collect(),
        );
    }

    Ok(RawSheet::new(source, rows))
}

/// Write one view as CSV: header row, then data rows.
pub fn write_view<W: Write>(view: &TabularView, out: W) -> Result<(), ReconError> {
    let storage = |e: csv::Error| ReconError::Storage(format!("csv export of '{}': {e}", view.name()));

    let mut writer = csv::WriterBuilder::new().from_writer(out);
    writer.write_record(view.columns()).map_err(storage)?;
    for row in view.rows() {
        writer
            .write_record(row.iter().map(|c| c.to_text()))
            .map_err(storage)?;
    }
    writer
        .flush()
        .map_err(|e| ReconError::Storage(format!("csv export of '{}': {e}", view.name())))?;
    Ok(())
}

pub fn view_to_bytes(view: &TabularView) -> Result<Vec<u8>, ReconError> {
    let mut buf = Vec::new();
    write_view(view, &mut buf)?;
    Ok(buf)
}
