//! Whole-series statistics in which each point counts for the time it covers.

use crate::rolling::quantile;
use crate::series::Series;
use chrono::Timelike;
use serde::{Deserialize, Serialize};

/// Values strictly above `above_ms` (and strictly below `below_ms`, if set) are outages.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutageRule {
	pub above_ms: f64,
	pub below_ms: Option<f64>,
}

impl OutageRule {
	pub fn above(above_ms: f64) -> Self { Self { above_ms, below_ms: None } }
	pub fn band(above_ms: f64, below_ms: f64) -> Self { Self { above_ms, below_ms: Some(below_ms) } }

	pub fn matches(&self, value: f64) -> bool {
		value > self.above_ms && self.below_ms.map_or(true, |b| value < b)
	}
}

/// `Σ weight where outage / Σ weight`, or `None` for a series with no weight.
pub fn outage_fraction(series: &Series, rule: &OutageRule) -> Option<f64> {
	let total = series.total_weight_us();
	if total == 0 { return None; }
	let matched = series.iter().filter(|p| rule.matches(p.value)).map(|p| p.weight_us).fold(0, i64::saturating_add);
	Some(matched as f64 / total as f64)
}

/// Outage fraction per UTC hour of day. Hours without samples report 0.
pub fn hourly_outage(series: &Series, rule: &OutageRule) -> [f64; 24] {
	let mut matched = [0i64; 24];
	let mut total = [0i64; 24];
	for p in series {
		let Some(hour) = p.timestamp.to_datetime().map(|dt| dt.hour() as usize) else { continue };
		total[hour] += p.weight_us;
		if rule.matches(p.value) { matched[hour] += p.weight_us; }
	}
	let mut out = [0.0; 24];
	for h in 0..24 {
		if total[h] > 0 { out[h] = matched[h] as f64 / total[h] as f64; }
	}
	out
}

/// `n` edges spaced evenly in log10 between the decades enclosing `[min, max]`.
pub fn log_bins(min: f64, max: f64, n: usize) -> Option<Vec<f64>> {
	if !(min > 0.0 && max >= min && max.is_finite()) || n < 2 { return None; }
	let lo = min.log10().floor();
	let hi = max.log10().ceil().max(lo + 1.0);
	let step = (hi - lo) / (n - 1) as f64;
	Some((0..n).map(|i| 10f64.powf(lo + step * i as f64)).collect())
}

/// Cumulative share of in-range weight per bin, one value per bin between
/// consecutive `edges`. The last bin includes its right edge.
pub fn weighted_cdf(series: &Series, edges: &[f64]) -> Option<Vec<f64>> {
	let bins = edges.len().checked_sub(1).filter(|&b| b > 0)?;
	let (first, last) = (edges[0], edges[bins]);
	let mut acc = vec![0i64; bins];
	for p in series {
		if !(p.value >= first && p.value <= last) { continue; }
		let idx = edges.partition_point(|e| *e <= p.value).saturating_sub(1).min(bins - 1);
		acc[idx] += p.weight_us;
	}
	let total: i64 = acc.iter().sum();
	if total == 0 { return None; }
	let mut running = 0i64;
	Some(acc.into_iter().map(|w| { running += w; running as f64 / total as f64 }).collect())
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Summary {
	pub points: usize,
	pub span_secs: f64,
	pub losses: usize,
	pub outage_fraction: Option<f64>,
	pub p50_ms: Option<f64>,
	pub p99_ms: Option<f64>,
}

impl Summary {
	pub fn of(series: &Series, rule: &OutageRule) -> Self {
		let values = || series.iter().map(|p| p.value);
		Self {
			points: series.len(),
			span_secs: series.total_weight(),
			losses: values().filter(|v| v.is_infinite()).count(),
			outage_fraction: outage_fraction(series, rule),
			p50_ms: quantile(values(), 0.5),
			p99_ms: quantile(values(), 0.99),
		}
	}
}
