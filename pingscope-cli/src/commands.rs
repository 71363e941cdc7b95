use crate::render::{num, Rows};
use anyhow::{bail, Context, Result};
use pingscope_core::record::{RecordFile, RecordWriter};
use pingscope_core::stats::{self, Summary};
use pingscope_core::{read_ping_log, AnalysisConfig, CurlFormat, CurlReader, Record, Series, Timestamp};
use serde_json::{json, Value};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::info;

const CDF_BINS: usize = 100;

fn cutoff(cfg: &AnalysisConfig) -> Option<Timestamp> {
	cfg.history_secs.map(|s| Timestamp::now().offset_secs(-(s as f64)))
}

fn latency_cell(ms: f64) -> Value {
	if ms.is_infinite() { json!("timeout") } else { num(Some(ms)) }
}

/// Weighted latency series from a ping text log, history filter applied.
pub fn load_ping_text(cfg: &AnalysisConfig, path: &Path) -> Result<Series> {
	let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
	let log = read_ping_log(BufReader::new(file), &cfg.ping_options()).with_context(|| format!("read {}", path.display()))?;
	info!(samples = log.report.samples, malformed = log.report.malformed, "ping log loaded");
	let series = log.series()?;
	Ok(match cutoff(cfg) { Some(c) => series.since(c), None => series })
}

/// Weighted latency series from a binary archive: the last `tail` records,
/// records inside the history window, or the whole file.
pub fn load_ping_archive(cfg: &AnalysisConfig, path: &Path, tail: Option<u64>) -> Result<Series> {
	let mut file = RecordFile::open(path).with_context(|| format!("open {}", path.display()))?;
	let records = match (tail, cutoff(cfg)) {
		(Some(k), _) => file.tail(k)?,
		(None, Some(c)) => file.since(c)?,
		(None, None) => file.read_all()?,
	};
	info!(records = records.len(), total = file.len(), "archive loaded");
	Ok(Series::from_records(&records)?)
}

pub fn load_curl(cfg: &AnalysisConfig, path: &Path, format_file: Option<&Path>) -> Result<Series> {
	let format_path = format_file
		.map(Path::to_path_buf)
		.or_else(|| cfg.curl.format_file.clone())
		.unwrap_or_else(|| PathBuf::from("curl-format.txt"));
	let format = CurlFormat::load_from_file(&format_path).with_context(|| format!("curl format {}", format_path.display()))?;
	let reader = CurlReader::new(format, &cfg.curl.total_field, cfg.parse_mode)?;
	let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
	let log = reader.read(BufReader::new(file)).with_context(|| format!("read {}", path.display()))?;
	info!(samples = log.report.samples, malformed = log.report.malformed, "curl log loaded");
	Ok(match cutoff(cfg) { Some(c) => log.series.since(c), None => log.series })
}

pub fn trend(cfg: &AnalysisConfig, series: &Series) -> Result<Rows> {
	let agg = cfg.aggregator()?;
	let rule = cfg.ping_outage_rule();
	let rate = agg.rate(series, |v| rule.matches(v));
	let quantile = agg.quantile(series, cfg.quantile);
	let mut rows = Rows::new(vec!["timestamp", "latency_ms", "outage_rate", "latency_quantile"]);
	for ((p, r), q) in series.iter().zip(&rate).zip(&quantile) {
		rows.push(vec![json!(p.timestamp.to_string()), latency_cell(p.value), num(r.value), num(q.value)]);
	}
	Ok(rows)
}

pub fn convert(cfg: &AnalysisConfig, input: &Path, output: &Path) -> Result<Rows> {
	let file = File::open(input).with_context(|| format!("open {}", input.display()))?;
	let log = read_ping_log(BufReader::new(file), &cfg.ping_options())?;
	let mut writer = RecordWriter::append(output).with_context(|| format!("open {}", output.display()))?;
	// Archives are kept in time order so `since` can binary search them.
	for s in &log.by_time() {
		writer.write(&Record::new(s.timestamp, s.latency))?;
	}
	let written = writer.finish()?;
	info!(written, output = %output.display(), "archive appended");
	let mut rows = Rows::new(vec!["lines", "samples", "malformed", "written"]);
	rows.push(vec![json!(log.report.lines), json!(log.report.samples), json!(log.report.malformed), json!(written)]);
	Ok(rows)
}

pub fn tail(path: &Path, count: u64) -> Result<Rows> {
	let records = pingscope_core::tail_records(path, count)?;
	let mut rows = Rows::new(vec!["timestamp", "latency_ms"]);
	for r in records {
		rows.push(vec![json!(r.timestamp().to_string()), latency_cell(r.latency())]);
	}
	Ok(rows)
}

pub fn summary(cfg: &AnalysisConfig, ping: &Series, curl: &Series) -> Rows {
	let mut rows = Rows::new(vec!["source", "points", "span_secs", "losses", "outage_pct", "p50_ms", "p99_ms"]);
	for (name, s, rule) in [("ping", ping, cfg.ping_outage_rule()), ("curl", curl, cfg.curl.outage_rule())] {
		let Summary { points, span_secs, losses, outage_fraction, p50_ms, p99_ms } = Summary::of(s, &rule);
		rows.push(vec![json!(name), json!(points), num(Some(span_secs)), json!(losses), num(outage_fraction.map(|f| f * 100.0)), num(p50_ms), num(p99_ms)]);
	}
	rows
}

pub fn cdf(cfg: &AnalysisConfig, ping: &Series, curl: &Series) -> Result<Rows> {
	let (ping, curl) = (ping.clone().finite(), curl.clone().finite());
	let values = || ping.iter().chain(curl.iter()).map(|p| p.value);
	let min = values().fold(f64::INFINITY, f64::min);
	let max = values().fold(f64::NEG_INFINITY, f64::max);
	let Some(edges) = stats::log_bins(min, max, CDF_BINS) else { bail!("no positive finite samples to bin") };
	let curl_cdf = stats::weighted_cdf(&curl, &edges);
	let ping_cdf = stats::weighted_cdf(&ping, &edges);
	if let Some(f) = stats::outage_fraction(&curl, &cfg.curl.outage_rule()) {
		info!(outage_pct = f * 100.0, "curl outage");
	}
	let mut rows = Rows::new(vec!["upper_ms", "curl_cdf", "ping_cdf"]);
	for (i, hi) in edges.iter().skip(1).enumerate() {
		let pick = |c: &Option<Vec<f64>>| c.as_ref().map(|v| v[i]);
		rows.push(vec![num(Some(*hi)), num(pick(&curl_cdf)), num(pick(&ping_cdf))]);
	}
	Ok(rows)
}

pub fn time_of_day(cfg: &AnalysisConfig, curl: &Series) -> Rows {
	let hourly = stats::hourly_outage(&curl.clone().finite(), &cfg.curl.outage_rule());
	let mut rows = Rows::new(vec!["hour_utc", "outage_pct"]);
	for (h, f) in hourly.iter().enumerate() {
		rows.push(vec![json!(h), num(Some(f * 100.0))]);
	}
	rows
}
