//! Time-windowed statistics over a weighted series.
//!
//! Both operations emit one [`TrendPoint`] per input point. A window that
//! reaches outside the observed span, or that holds nothing to report,
//! yields `None` ("no data") rather than zero.

use crate::error::{Error, Result};
use crate::series::{Series, WeightedPoint};
use crate::types::Timestamp;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
	/// `[t - W/2, t + W/2]`
	#[default]
	Centered,
	/// `[t - W, t]`
	Trailing,
}

/// Window of fixed duration positioned relative to each point. Both edges are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
	duration_us: i64,
	alignment: Alignment,
}

impl Window {
	pub fn new(duration: Duration, alignment: Alignment) -> Result<Self> {
		let duration_us = i64::try_from(duration.as_micros()).map_err(|_| Error::config("window too long"))?;
		if duration_us <= 0 {
			return Err(Error::config("window must be longer than zero"));
		}
		Ok(Self { duration_us, alignment })
	}

	pub fn duration(&self) -> Duration { Duration::from_micros(self.duration_us as u64) }
	pub fn alignment(&self) -> Alignment { self.alignment }

	/// Inclusive `(lo, hi)` bounds in microseconds for a point at `t`, saturating.
	fn bounds(&self, t: Timestamp) -> (i64, i64) {
		let t = t.as_micros();
		match self.alignment {
			Alignment::Centered => {
				let lo = t.saturating_sub(self.duration_us / 2);
				(lo, lo.saturating_add(self.duration_us))
			}
			Alignment::Trailing => (t.saturating_sub(self.duration_us), t),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrendPoint {
	pub timestamp: Timestamp,
	pub value: Option<f64>,
}

/// One window position as seen by a scan visitor.
struct Frame<'a> {
	/// The window lies within the observed span.
	covered: bool,
	lo: i64,
	/// Points inside the window.
	inside: &'a [WeightedPoint],
	/// Points that entered since the previous position.
	entered: &'a [WeightedPoint],
	/// Points that left since the previous position.
	left: &'a [WeightedPoint],
}

/// Two-pointer scan handing each point its window as slice ranges.
fn scan(series: &Series, window: Window, mut visit: impl FnMut(Frame<'_>) -> Option<f64>) -> Vec<TrendPoint> {
	let (Some(start), Some(end)) = (series.start(), series.end()) else { return Vec::new() };
	let pts = series.points();
	let (mut lo_idx, mut hi_idx) = (0, 0);
	let mut out = Vec::with_capacity(pts.len());
	for p in pts {
		let (lo, hi) = window.bounds(p.timestamp);
		let entered_from = hi_idx;
		while hi_idx < pts.len() && pts[hi_idx].timestamp.as_micros() <= hi { hi_idx += 1; }
		let left_from = lo_idx;
		while lo_idx < hi_idx && pts[lo_idx].timestamp.as_micros() < lo { lo_idx += 1; }
		let covered = lo >= start.as_micros() && hi <= end.as_micros();
		let value = visit(Frame {
			covered,
			lo,
			inside: &pts[lo_idx..hi_idx],
			entered: &pts[entered_from..hi_idx],
			left: &pts[left_from..lo_idx],
		});
		out.push(TrendPoint { timestamp: p.timestamp, value });
	}
	out
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RollingAggregator {
	window: Window,
	rate_unit_secs: f64,
}

impl RollingAggregator {
	/// `rate_unit_secs` scales rates, e.g. 60 for seconds-per-minute.
	pub fn new(window: Window, rate_unit_secs: f64) -> Self { Self { window, rate_unit_secs } }

	pub fn window(&self) -> Window { self.window }

	/// Share of each window's duration covered by points matching `predicate`,
	/// scaled to the rate unit. Only the part of a point's interval inside the
	/// window counts, so a rate never exceeds the unit. Zero rates are
	/// reported as no data.
	pub fn rate(&self, series: &Series, predicate: impl Fn(f64) -> bool) -> Vec<TrendPoint> {
		let mut matched_us: i64 = 0;
		let duration_us = self.window.duration_us as f64;
		let unit = self.rate_unit_secs;
		scan(series, self.window, |frame| {
			let weight = |q: &WeightedPoint| if predicate(q.value) { q.weight_us } else { 0 };
			matched_us = frame.entered.iter().map(weight).fold(matched_us, i64::saturating_add);
			matched_us = frame.left.iter().map(weight).fold(matched_us, i64::saturating_sub);
			// Later points start where their predecessor ended, inside the window;
			// only the first one can reach back past `lo`.
			let overhang = frame.inside.first().map_or(0, |q| {
				let outside = q.weight_us.saturating_sub(q.timestamp.as_micros().saturating_sub(frame.lo));
				weight(q).min(outside.max(0))
			});
			let matched = matched_us.saturating_sub(overhang);
			if !frame.covered || matched <= 0 { return None; }
			Some(matched as f64 / duration_us * unit)
		})
	}

	/// Rolling `q`-quantile of the finite values in each window, weights ignored.
	pub fn quantile(&self, series: &Series, q: f64) -> Vec<TrendPoint> {
		let mut sorted: Vec<f64> = Vec::new();
		scan(series, self.window, |frame| {
			for v in frame.entered.iter().map(|p| p.value).filter(|v| v.is_finite()) {
				let at = sorted.partition_point(|x| *x < v);
				sorted.insert(at, v);
			}
			for v in frame.left.iter().map(|p| p.value).filter(|v| v.is_finite()) {
				let at = sorted.partition_point(|x| *x < v);
				sorted.remove(at);
			}
			if !frame.covered { return None; }
			quantile_sorted(&sorted, q)
		})
	}
}

/// Linear-interpolated quantile of ascending `sorted`. `q` is clamped to [0, 1].
pub fn quantile_sorted(sorted: &[f64], q: f64) -> Option<f64> {
	let last = sorted.len().checked_sub(1)?;
	let pos = q.clamp(0.0, 1.0) * last as f64;
	let (lo, hi) = (pos.floor() as usize, pos.ceil() as usize);
	Some(sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64))
}

/// Quantile of the finite values in `values`.
pub fn quantile(values: impl IntoIterator<Item = f64>, q: f64) -> Option<f64> {
	let mut v: Vec<f64> = values.into_iter().filter(|x| x.is_finite()).collect();
	v.sort_by(f64::total_cmp);
	quantile_sorted(&v, q)
}
