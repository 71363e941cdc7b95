//! HTTP round-trip logs written with `curl -w @format-file`.
//!
//! Each log line is a timestamp followed by the values named in the format
//! description, separated by whitespace. The description itself looks like
//! `%{time_namelookup} %{time_connect} %{time_total}\n` and is loaded once
//! into a [`CurlFormat`] that the reader owns.

use crate::config::ParseMode;
use crate::error::{Error, Result};
use crate::ping::ParseReport;
use crate::series::Series;
use crate::types::Timestamp;
use chrono::{DateTime, NaiveDateTime};
use std::io::BufRead;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, warn};

pub const TIMESTAMP_COLUMN: &str = "timestamp";
pub const DEFAULT_TOTAL_FIELD: &str = "time_total";

/// Column layout of a curl log: `timestamp` followed by the format's fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurlFormat {
	columns: Vec<String>,
}

impl CurlFormat {
	pub fn parse(text: &str) -> Result<Self> {
		let body = text.trim_end();
		let body = body.strip_suffix("\\n").unwrap_or(body);
		let mut columns = vec![TIMESTAMP_COLUMN.to_string()];
		for tok in body.split_whitespace() {
			let name = tok
				.strip_prefix("%{")
				.and_then(|t| t.strip_suffix('}'))
				.filter(|n| !n.is_empty())
				.ok_or_else(|| Error::config(format!("unrecognised curl format token {tok:?}")))?;
			columns.push(name.to_string());
		}
		if columns.len() == 1 {
			return Err(Error::config("curl format names no fields"));
		}
		Ok(Self { columns })
	}

	pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
		let text = std::fs::read_to_string(path)?;
		Self::parse(&text)
	}

	pub fn columns(&self) -> &[String] { &self.columns }
	pub fn position(&self, name: &str) -> Option<usize> { self.columns.iter().position(|c| c == name) }
}

impl FromStr for CurlFormat {
	type Err = Error;
	fn from_str(s: &str) -> Result<Self> { Self::parse(s) }
}

/// Accepts RFC 3339, ISO-8601 with a numeric offset, naive ISO-8601 (UTC) or epoch seconds.
pub fn parse_timestamp(s: &str) -> Option<Timestamp> {
	if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
		return Some(Timestamp::from_datetime(&dt));
	}
	if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f%z") {
		return Some(Timestamp::from_datetime(&dt));
	}
	if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
		return Some(Timestamp::from_naive_utc(dt));
	}
	s.parse::<f64>().ok().filter(|v| v.is_finite()).map(Timestamp::from_secs_f64)
}

#[derive(Debug, Clone)]
pub struct CurlLog {
	/// Total time in milliseconds, weighted by the gap to the previous request.
	pub series: Series,
	pub report: ParseReport,
}

#[derive(Debug, Clone)]
pub struct CurlReader {
	format: CurlFormat,
	total_index: usize,
	mode: ParseMode,
}

impl CurlReader {
	pub fn new(format: CurlFormat, total_field: &str, mode: ParseMode) -> Result<Self> {
		let total_index = format
			.position(total_field)
			.filter(|&i| i > 0)
			.ok_or_else(|| Error::config(format!("curl format has no {total_field:?} field")))?;
		Ok(Self { format, total_index, mode })
	}

	pub fn format(&self) -> &CurlFormat { &self.format }

	/// `(timestamp, total_ms)` for one log line; `Ok(None)` for a blank line.
	pub fn parse_row(&self, line_no: usize, line: &str) -> Result<Option<(Timestamp, f64)>> {
		let mut cols = line.split_whitespace();
		let Some(first) = cols.next() else { return Ok(None) };
		let timestamp = parse_timestamp(first).ok_or_else(|| Error::malformed(line_no, format!("bad timestamp {first:?}")))?;
		let raw = cols
			.nth(self.total_index - 1)
			.ok_or_else(|| Error::malformed(line_no, format!("expected at least {} columns", self.total_index + 1)))?;
		let secs: f64 = raw.parse().map_err(|_| Error::malformed(line_no, format!("bad total time {raw:?}")))?;
		Ok(Some((timestamp, secs * 1000.0)))
	}

	/// Read a whole log (no header) into a weighted series of total times.
	pub fn read<R: BufRead>(&self, reader: R) -> Result<CurlLog> {
		let mut report = ParseReport::default();
		let mut rows = Vec::new();
		for (i, line) in reader.lines().enumerate() {
			let line = line?;
			report.lines += 1;
			match self.parse_row(i + 1, &line) {
				Ok(Some(row)) => {
					report.samples += 1;
					rows.push(row);
				}
				Ok(None) => report.skipped += 1,
				Err(e) if self.mode == ParseMode::Lenient => {
					report.malformed += 1;
					warn!(error = %e, "skipping malformed curl line");
				}
				Err(e) => return Err(e),
			}
		}
		debug!(lines = report.lines, samples = report.samples, malformed = report.malformed, "curl log read");
		Ok(CurlLog { series: Series::build(rows)?, report })
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const FORMAT: &str = "%{time_namelookup} %{time_connect} %{time_total}\\n\n";

	#[test]
	fn format_columns() {
		let f: CurlFormat = FORMAT.parse().unwrap();
		assert_eq!(f.columns(), &["timestamp", "time_namelookup", "time_connect", "time_total"]);
		assert_eq!(f.position("time_total"), Some(3));
		assert!(CurlFormat::parse("time_total").is_err());
		assert!(CurlFormat::parse("\\n").is_err());
	}

	#[test]
	fn timestamps_in_several_shapes() {
		let a = parse_timestamp("2021-03-04T05:06:07+00:00").unwrap();
		assert_eq!(parse_timestamp("2021-03-04T06:06:07+0100"), Some(a));
		assert_eq!(parse_timestamp("2021-03-04T05:06:07"), Some(a));
		assert_eq!(parse_timestamp("1614834367"), Some(a));
		assert_eq!(parse_timestamp("yesterday"), None);
	}

	#[test]
	fn rows_scale_total_to_ms() {
		let r = CurlReader::new(FORMAT.parse().unwrap(), DEFAULT_TOTAL_FIELD, ParseMode::Strict).unwrap();
		let (_, ms) = r.parse_row(1, "2021-03-04T05:06:07+00:00 0.010 0.020 0.250").unwrap().unwrap();
		assert!((ms - 250.0).abs() < 1e-9);
		assert!(r.parse_row(2, "2021-03-04T05:06:07+00:00 0.010").is_err());
		assert!(CurlReader::new(FORMAT.parse().unwrap(), "time_redirect", ParseMode::Strict).is_err());
	}
}
