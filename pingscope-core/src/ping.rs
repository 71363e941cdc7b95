//! Ping text log parsing.
//!
//! Line 1 of a log is a header. Every other line starts with a bracketed
//! timestamp and is either a reply
//! (`[..] 64 bytes from ..: icmp_seq=12 ttl=57 time=14.2 ms`), a timeout
//! (`[..] Request timeout for icmp_seq 13`) or anything else, which is
//! ignored. Byte-count lines without `icmp_seq=` (ICMP errors such as
//! `92 bytes from ..: Destination Host Unreachable`) fall in the last group.

use crate::config::ParseMode;
use crate::error::{Error, Result};
use crate::sequence::SequenceUnwrapper;
use crate::series::Series;
use crate::types::{RawSample, Timestamp, UnwrappedSample, DEFAULT_WRAP_PERIOD};
use chrono::NaiveDateTime;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::io::{self, BufRead};
use tracing::{debug, warn};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

static TIMESTAMP: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\[([^\]]+)\]").expect("timestamp regex"));
static TIMEOUT_SEQ: Lazy<Regex> = Lazy::new(|| Regex::new(r"\sicmp_seq (\d+)$").expect("timeout regex"));
static REPLY_MARK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+ bytes").expect("reply marker regex"));
static REPLY_SEQ: Lazy<Regex> = Lazy::new(|| Regex::new(r"\sicmp_seq=(\d+)\s").expect("reply seq regex"));
static REPLY_TIME: Lazy<Regex> = Lazy::new(|| Regex::new(r"\stime=(\S+) ms$").expect("reply time regex"));

/// Parse one data line. `Ok(None)` means the line is neither a reply nor a
/// timeout and is deliberately ignored.
pub fn parse_line(line_no: usize, line: &str) -> Result<Option<RawSample>> {
	let line = line.trim();
	if line.is_empty() { return Ok(None); }
	let ts = TIMESTAMP
		.captures(line)
		.and_then(|c| c.get(1))
		.ok_or_else(|| Error::malformed(line_no, "missing bracketed timestamp"))?;
	let timestamp = NaiveDateTime::parse_from_str(ts.as_str(), TIMESTAMP_FORMAT)
		.map(Timestamp::from_naive_utc)
		.map_err(|e| Error::malformed(line_no, format!("bad timestamp {:?}: {e}", ts.as_str())))?;

	if line.contains("Request timeout") {
		let sequence = capture_seq(&TIMEOUT_SEQ, line, line_no)?;
		return Ok(Some(RawSample { timestamp, sequence, latency: f64::INFINITY }));
	}
	if REPLY_MARK.is_match(line) && line.contains("icmp_seq=") {
		let sequence = capture_seq(&REPLY_SEQ, line, line_no)?;
		let raw = REPLY_TIME
			.captures(line)
			.and_then(|c| c.get(1))
			.ok_or_else(|| Error::malformed(line_no, "reply without time= field"))?;
		let latency: f64 = raw
			.as_str()
			.parse()
			.map_err(|_| Error::malformed(line_no, format!("bad latency {:?}", raw.as_str())))?;
		return Ok(Some(RawSample { timestamp, sequence, latency }));
	}
	Ok(None)
}

fn capture_seq(re: &Regex, line: &str, line_no: usize) -> Result<u32> {
	let m = re
		.captures(line)
		.and_then(|c| c.get(1))
		.ok_or_else(|| Error::malformed(line_no, "missing icmp_seq"))?;
	m.as_str().parse().map_err(|_| Error::malformed(line_no, format!("icmp_seq out of range: {}", m.as_str())))
}

/// Counters collected while reading a log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ParseReport {
	pub lines: usize,
	pub samples: usize,
	pub skipped: usize,
	pub malformed: usize,
}

/// Lazy iterator of samples over data lines.
///
/// Strict mode yields the first malformed line as an error and then stops.
/// Lenient mode logs and counts malformed lines and carries on. I/O errors
/// always end the iteration.
pub struct PingLines<I> {
	lines: I,
	line_no: usize,
	mode: ParseMode,
	report: ParseReport,
	done: bool,
}

impl<I> PingLines<I> {
	/// Every item of `lines` is a data line, numbered from 1.
	pub fn new(lines: I, mode: ParseMode) -> Self {
		Self { lines, line_no: 0, mode, report: ParseReport::default(), done: false }
	}

	/// Number the next line `line_no` (used after skipping a header).
	pub fn starting_at(mut self, line_no: usize) -> Self {
		self.line_no = line_no.saturating_sub(1);
		self
	}

	pub fn report(&self) -> ParseReport { self.report }
}

impl<I, S> Iterator for PingLines<I>
where
	I: Iterator<Item = io::Result<S>>,
	S: AsRef<str>,
{
	type Item = Result<RawSample>;

	fn next(&mut self) -> Option<Self::Item> {
		if self.done { return None; }
		loop {
			let line = match self.lines.next()? {
				Ok(l) => l,
				Err(e) => {
					self.done = true;
					return Some(Err(e.into()));
				}
			};
			self.line_no += 1;
			self.report.lines += 1;
			match parse_line(self.line_no, line.as_ref()) {
				Ok(Some(s)) => {
					self.report.samples += 1;
					return Some(Ok(s));
				}
				Ok(None) => self.report.skipped += 1,
				Err(e) => match self.mode {
					ParseMode::Strict => {
						self.done = true;
						return Some(Err(e));
					}
					ParseMode::Lenient => {
						self.report.malformed += 1;
						warn!(error = %e, "skipping malformed ping line");
					}
				},
			}
		}
	}
}

/// Samples of a whole log file, header skipped.
pub fn parse_log<R: BufRead>(reader: R, mode: ParseMode) -> PingLines<std::iter::Skip<io::Lines<R>>> {
	PingLines::new(reader.lines().skip(1), mode).starting_at(2)
}

#[derive(Debug, Clone, Copy)]
pub struct PingOptions {
	pub mode: ParseMode,
	pub wrap_period: u64,
}

impl Default for PingOptions {
	fn default() -> Self { Self { mode: ParseMode::default(), wrap_period: DEFAULT_WRAP_PERIOD } }
}

/// A fully read ping log: unwrapped samples in logical order.
#[derive(Debug, Clone)]
pub struct PingLog {
	pub samples: Vec<UnwrappedSample>,
	pub report: ParseReport,
}

impl PingLog {
	/// `(timestamp, latency)` pairs in logical order, ready for the series builder.
	pub fn points(&self) -> impl Iterator<Item = (Timestamp, f64)> + '_ {
		self.samples.iter().map(|s| (s.timestamp, s.latency))
	}

	/// Samples in the order they were logged. A reply slower than the ping
	/// interval is logged after later requests, so this can differ from
	/// logical order.
	pub fn by_time(&self) -> Vec<UnwrappedSample> {
		let mut out = self.samples.clone();
		out.sort_by_key(|s| s.timestamp);
		out
	}

	pub fn series(&self) -> Result<Series> { Series::from_samples(&self.samples) }
}

/// Parse and unwrap a complete ping log.
pub fn read_ping_log<R: BufRead>(reader: R, opts: &PingOptions) -> Result<PingLog> {
	let mut lines = parse_log(reader, opts.mode);
	let mut unwrapper = SequenceUnwrapper::new(opts.wrap_period);
	for sample in lines.by_ref() {
		unwrapper.push(sample?);
	}
	let report = lines.report();
	debug!(lines = report.lines, samples = report.samples, malformed = report.malformed, duplicates = unwrapper.overwritten(), "ping log read");
	Ok(PingLog { samples: unwrapper.finish(), report })
}

#[cfg(test)]
mod tests {
	use super::*;

	const REPLY: &str = "[2021-03-04T05:06:07.250000] 64 bytes from 1.1.1.1: icmp_seq=42 ttl=57 time=14.213 ms";
	const TIMEOUT: &str = "[2021-03-04T05:06:08.000001] Request timeout for icmp_seq 43";

	#[test]
	fn reply_line() {
		let s = parse_line(2, REPLY).unwrap().unwrap();
		assert_eq!(s.sequence, 42);
		assert!((s.latency - 14.213).abs() < 1e-9);
		assert_eq!(s.timestamp.to_string(), "2021-03-04T05:06:07.250000Z");
	}

	#[test]
	fn timeout_line_is_infinite() {
		let s = parse_line(2, TIMEOUT).unwrap().unwrap();
		assert_eq!(s.sequence, 43);
		assert!(s.is_loss());
	}

	#[test]
	fn banner_lines_are_ignored_but_timestamp_is_required() {
		assert!(parse_line(3, "[2021-03-04T05:06:09.000000] --- 1.1.1.1 ping statistics ---").unwrap().is_none());
		assert!(parse_line(3, "").unwrap().is_none());
		let err = parse_line(3, "64 bytes from 1.1.1.1: icmp_seq=1 time=1 ms").unwrap_err();
		assert!(matches!(err, Error::MalformedLine { line: 3, .. }));
	}

	#[test]
	fn icmp_error_replies_are_ignored() {
		let line = "[2021-03-04T05:06:04.000000] 92 bytes from 192.168.1.1: Destination Host Unreachable";
		assert!(parse_line(3, line).unwrap().is_none());
		let text = format!("PING 1.1.1.1\n{line}\n{REPLY}\n");
		let ok: Vec<_> = parse_log(text.as_bytes(), ParseMode::Strict).collect::<Result<_>>().unwrap();
		assert_eq!(ok.len(), 1);
	}

	#[test]
	fn reply_without_time_is_malformed() {
		let err = parse_line(5, "[2021-03-04T05:06:07.000000] 64 bytes from x: icmp_seq=1 ttl=5").unwrap_err();
		assert!(err.to_string().contains("time="));
	}

	#[test]
	fn strict_stops_lenient_counts() {
		let text = format!("PING 1.1.1.1\n{REPLY}\ngarbage\n{TIMEOUT}\n");
		let strict: Vec<_> = parse_log(text.as_bytes(), ParseMode::Strict).collect();
		assert_eq!(strict.len(), 2);
		assert!(matches!(strict[1], Err(Error::MalformedLine { line: 3, .. })));

		let mut lenient = parse_log(text.as_bytes(), ParseMode::Lenient);
		let ok: Vec<_> = lenient.by_ref().collect::<Result<_>>().unwrap();
		assert_eq!(ok.len(), 2);
		assert_eq!(lenient.report(), ParseReport { lines: 3, samples: 2, skipped: 0, malformed: 1 });
	}
}
