//! Duration-weighted series.
//!
//! Every point carries the time elapsed since its predecessor. The first
//! input point has no predecessor and is not emitted, so the weights of a
//! freshly built series telescope to exactly `end - start`.

use crate::error::{Error, Result};
use crate::record::Record;
use crate::types::{Timestamp, UnwrappedSample};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WeightedPoint {
	pub timestamp: Timestamp,
	pub value: f64,
	/// Microseconds since the previous point; never negative.
	pub weight_us: i64,
}

impl WeightedPoint {
	/// Weight in seconds.
	pub fn weight(&self) -> f64 { self.weight_us as f64 / 1_000_000.0 }
	/// Start of the interval this point accounts for.
	pub fn covers_from(&self) -> Timestamp { Timestamp::from_micros(self.timestamp.as_micros().saturating_sub(self.weight_us)) }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Series {
	points: Vec<WeightedPoint>,
}

impl Series {
	/// Build from `(timestamp, value)` pairs sorted ascending by timestamp.
	/// Equal timestamps are allowed and get a zero weight.
	pub fn build(pairs: impl IntoIterator<Item = (Timestamp, f64)>) -> Result<Self> {
		let mut iter = pairs.into_iter();
		let Some((mut prev, _)) = iter.next() else { return Ok(Self::default()) };
		let mut points = Vec::with_capacity(iter.size_hint().0);
		for (i, (timestamp, value)) in iter.enumerate() {
			let weight_us = timestamp.micros_since(prev);
			if weight_us < 0 {
				return Err(Error::Unordered { index: i + 1 });
			}
			points.push(WeightedPoint { timestamp, value, weight_us });
			prev = timestamp;
		}
		Ok(Self { points })
	}

	/// Samples are put in timestamp order first (stable, so equal timestamps
	/// keep logical order). Late replies are weighted by when they were logged.
	pub fn from_samples(samples: &[UnwrappedSample]) -> Result<Self> {
		let mut pairs: Vec<_> = samples.iter().map(|s| (s.timestamp, s.latency)).collect();
		pairs.sort_by_key(|&(t, _)| t);
		Self::build(pairs)
	}

	pub fn from_records(records: &[Record]) -> Result<Self> {
		Self::build(records.iter().map(|r| (r.timestamp(), r.latency())))
	}

	pub fn points(&self) -> &[WeightedPoint] { &self.points }
	pub fn iter(&self) -> std::slice::Iter<'_, WeightedPoint> { self.points.iter() }
	pub fn len(&self) -> usize { self.points.len() }
	pub fn is_empty(&self) -> bool { self.points.is_empty() }

	/// Beginning of the observed span: the instant the first point's weight starts from.
	pub fn start(&self) -> Option<Timestamp> { self.points.first().map(WeightedPoint::covers_from) }
	pub fn end(&self) -> Option<Timestamp> { self.points.last().map(|p| p.timestamp) }

	pub fn total_weight_us(&self) -> i64 { self.points.iter().map(|p| p.weight_us).fold(0, i64::saturating_add) }
	pub fn total_weight(&self) -> f64 { self.total_weight_us() as f64 / 1_000_000.0 }

	/// Keep points at or after `cutoff`. Weights are left as computed, so the
	/// first kept point still accounts for the gap before it.
	pub fn since(self, cutoff: Timestamp) -> Self {
		let first = self.points.partition_point(|p| p.timestamp < cutoff);
		Self { points: self.points[first..].to_vec() }
	}

	/// Drop points whose value is not finite (losses, NaN).
	pub fn finite(self) -> Self { self.filter(|p| p.value.is_finite()) }

	pub fn filter(self, mut keep: impl FnMut(&WeightedPoint) -> bool) -> Self {
		Self { points: self.points.into_iter().filter(|p| keep(p)).collect() }
	}
}

impl<'a> IntoIterator for &'a Series {
	type Item = &'a WeightedPoint;
	type IntoIter = std::slice::Iter<'a, WeightedPoint>;
	fn into_iter(self) -> Self::IntoIter { self.points.iter() }
}

#[cfg(test)]
mod tests {
	use super::*;

	fn ts(us: i64) -> Timestamp { Timestamp::from_micros(us) }

	#[test]
	fn first_point_is_dropped() {
		let s = Series::build([(ts(10), 1.0), (ts(15), 2.0), (ts(15), 3.0), (ts(40), 4.0)]).unwrap();
		assert_eq!(s.len(), 3);
		assert_eq!(s.points().iter().map(|p| p.weight_us).collect::<Vec<_>>(), vec![5, 0, 25]);
		assert_eq!(s.start(), Some(ts(10)));
		assert_eq!(s.total_weight_us(), 30);
	}

	#[test]
	fn single_or_empty_input_gives_empty_series() {
		assert!(Series::build([(ts(1), 1.0)]).unwrap().is_empty());
		assert!(Series::build(std::iter::empty()).unwrap().start().is_none());
	}

	#[test]
	fn backwards_time_is_rejected() {
		let err = Series::build([(ts(10), 1.0), (ts(20), 1.0), (ts(19), 1.0)]).unwrap_err();
		assert!(matches!(err, Error::Unordered { index: 2 }));
	}

	#[test]
	fn since_keeps_weights() {
		let s = Series::build([(ts(0), 0.0), (ts(10), 1.0), (ts(30), 2.0)]).unwrap().since(ts(20));
		assert_eq!(s.len(), 1);
		assert_eq!(s.points()[0].weight_us, 20);
		assert_eq!(s.start(), Some(ts(10)));
	}

	#[test]
	fn samples_out_of_time_order_are_sorted() {
		let sample = |sequence, us, latency| UnwrappedSample { timestamp: ts(us), sequence, latency };
		let s = Series::from_samples(&[sample(4, 0, 1.0), sample(5, 25, 1500.0), sample(6, 10, 2.0), sample(7, 30, 3.0)]).unwrap();
		assert_eq!(s.points().iter().map(|p| p.value).collect::<Vec<_>>(), vec![2.0, 1500.0, 3.0]);
		assert_eq!(s.points().iter().map(|p| p.weight_us).collect::<Vec<_>>(), vec![10, 15, 5]);
	}

	#[test]
	fn finite_drops_losses() {
		let s = Series::build([(ts(0), 0.0), (ts(1_000_000), f64::INFINITY), (ts(3_000_000), 5.0)]).unwrap().finite();
		assert_eq!(s.len(), 1);
		assert_eq!(s.points()[0].weight(), 2.0);
	}
}
