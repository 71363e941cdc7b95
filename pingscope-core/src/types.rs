use chrono::{DateTime, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Latency in milliseconds. `f64::INFINITY` marks a declared loss (timeout).
pub type LatencyMs = f64;

/// ICMP sequence number as reported by the device.
pub type DeviceSeq = u32;

/// Sequence number after wraparound has been resolved.
pub type LogicalSeq = u64;

/// Default modulus of ICMP sequence numbers.
pub const DEFAULT_WRAP_PERIOD: u64 = 1 << 16;

const MICROS_PER_SEC: f64 = 1_000_000.0;

/// Instant in whole microseconds since the Unix epoch.
///
/// Integer storage keeps differences exact, so interval weights derived from
/// consecutive timestamps always add up to the covered span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(pub i64);

impl Timestamp {
	pub const fn from_micros(us: i64) -> Self { Self(us) }
	pub const fn as_micros(self) -> i64 { self.0 }

	/// Rounds to the nearest microsecond.
	pub fn from_secs_f64(secs: f64) -> Self { Self((secs * MICROS_PER_SEC).round() as i64) }
	pub fn as_secs_f64(self) -> f64 { self.0 as f64 / MICROS_PER_SEC }

	/// Naive wall-clock times carry no offset; they are read as UTC.
	pub fn from_naive_utc(dt: NaiveDateTime) -> Self { Self(dt.and_utc().timestamp_micros()) }
	pub fn from_datetime<Tz: TimeZone>(dt: &DateTime<Tz>) -> Self { Self(dt.timestamp_micros()) }
	pub fn to_datetime(self) -> Option<DateTime<Utc>> { DateTime::from_timestamp_micros(self.0) }
	pub fn now() -> Self { Self::from_datetime(&Utc::now()) }

	/// Microseconds elapsed from `earlier` to `self` (negative if `earlier` is later), saturating.
	pub fn micros_since(self, earlier: Timestamp) -> i64 { self.0.saturating_sub(earlier.0) }

	pub fn offset_secs(self, secs: f64) -> Self { Self(self.0.saturating_add((secs * MICROS_PER_SEC).round() as i64)) }
}

impl fmt::Display for Timestamp {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self.to_datetime() {
			Some(dt) => f.write_str(&dt.to_rfc3339_opts(SecondsFormat::Micros, true)),
			None => write!(f, "{}us", self.0),
		}
	}
}

/// One parsed ping line, before wraparound resolution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawSample {
	pub timestamp: Timestamp,
	pub sequence: DeviceSeq,
	pub latency: LatencyMs,
}

impl RawSample {
	pub fn is_loss(&self) -> bool { self.latency == f64::INFINITY }
}

/// A ping sample keyed by its globally increasing logical sequence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct UnwrappedSample {
	pub timestamp: Timestamp,
	pub sequence: LogicalSeq,
	pub latency: LatencyMs,
}

impl UnwrappedSample {
	pub fn is_loss(&self) -> bool { self.latency == f64::INFINITY }
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::NaiveDate;

	#[test]
	fn seconds_roundtrip_keeps_micros() {
		let ts = Timestamp::from_micros(1_612_345_678_123_456);
		assert_eq!(Timestamp::from_secs_f64(ts.as_secs_f64()), ts);
	}

	#[test]
	fn naive_is_utc() {
		let dt = NaiveDate::from_ymd_opt(2021, 2, 3).unwrap().and_hms_micro_opt(4, 5, 6, 7).unwrap();
		let ts = Timestamp::from_naive_utc(dt);
		assert_eq!(ts.to_string(), "2021-02-03T04:05:06.000007Z");
		assert_eq!(ts.micros_since(ts.offset_secs(-1.5)), 1_500_000);
	}

	#[test]
	fn extreme_timestamps_saturate() {
		let (lo, hi) = (Timestamp::from_secs_f64(-1e300), Timestamp::from_secs_f64(1e300));
		assert_eq!(lo, Timestamp::from_micros(i64::MIN));
		assert_eq!(hi.micros_since(lo), i64::MAX);
		assert_eq!(lo.micros_since(hi), i64::MIN);
		assert_eq!(hi.offset_secs(10.0), hi);
	}
}
