//! ICMP sequence wraparound resolution.
//!
//! Device sequence numbers are transmitted modulo a wrap period and restart
//! at 0. The unwrapper assigns each sample a logical sequence that keeps
//! growing across epochs, then emits the samples ordered by that key.
//! Resolution is two-phase: samples are accumulated into an ordered map
//! (later duplicates overwrite earlier ones) and emitted only once the
//! whole input has been seen.

use crate::types::{DeviceSeq, LatencyMs, LogicalSeq, RawSample, Timestamp, UnwrappedSample, DEFAULT_WRAP_PERIOD};
use std::collections::BTreeMap;
use tracing::trace;

#[derive(Debug, Clone)]
pub struct SequenceUnwrapper {
	wrap_period: u64,
	offset: u64,
	previous_logical: Option<LogicalSeq>,
	previous_device: Option<DeviceSeq>,
	samples: BTreeMap<LogicalSeq, (Timestamp, LatencyMs)>,
	overwritten: usize,
}

impl Default for SequenceUnwrapper {
	fn default() -> Self { Self::new(DEFAULT_WRAP_PERIOD) }
}

impl SequenceUnwrapper {
	/// `wrap_period` is clamped to at least 1.
	pub fn new(wrap_period: u64) -> Self {
		Self {
			wrap_period: wrap_period.max(1),
			offset: 0,
			previous_logical: None,
			previous_device: None,
			samples: BTreeMap::new(),
			overwritten: 0,
		}
	}

	/// Assign a logical sequence to `sample` and record it. Returns the key used.
	pub fn push(&mut self, sample: RawSample) -> LogicalSeq {
		let seq = u64::from(sample.sequence);
		if seq == 0 {
			// Every zero opens a new epoch right after the last key seen,
			// including the first sample and device restarts.
			self.offset = self.previous_logical.map_or(0, |p| p + 1);
			trace!(offset = self.offset, "sequence epoch start");
		} else if let Some(prev) = self.previous_device.map(u64::from) {
			// Large backward jump: the device wrapped but its zero never made it into the log.
			if prev > seq && prev - seq > self.wrap_period / 2 {
				self.offset += self.wrap_period;
				trace!(offset = self.offset, prev, seq, "sequence wrap without zero");
			}
		}
		let logical = seq + self.offset;
		if self.samples.insert(logical, (sample.timestamp, sample.latency)).is_some() {
			self.overwritten += 1;
		}
		self.previous_logical = Some(logical);
		self.previous_device = Some(sample.sequence);
		logical
	}

	pub fn len(&self) -> usize { self.samples.len() }
	pub fn is_empty(&self) -> bool { self.samples.is_empty() }

	/// Number of pushes that replaced an existing logical key.
	pub fn overwritten(&self) -> usize { self.overwritten }

	/// Emit all samples in ascending logical order.
	pub fn finish(self) -> Vec<UnwrappedSample> {
		self.samples
			.into_iter()
			.map(|(sequence, (timestamp, latency))| UnwrappedSample { timestamp, sequence, latency })
			.collect()
	}
}

impl Extend<RawSample> for SequenceUnwrapper {
	fn extend<T: IntoIterator<Item = RawSample>>(&mut self, iter: T) {
		for s in iter { self.push(s); }
	}
}

/// Unwrap a complete batch of raw samples.
pub fn unwrap_sequences(samples: impl IntoIterator<Item = RawSample>, wrap_period: u64) -> Vec<UnwrappedSample> {
	let mut u = SequenceUnwrapper::new(wrap_period);
	u.extend(samples);
	u.finish()
}
