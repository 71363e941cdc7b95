use crate::error::{Error, Result};
use crate::rolling::{Alignment, RollingAggregator, Window};
use crate::stats::OutageRule;
use crate::types::DEFAULT_WRAP_PERIOD;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path, path::PathBuf, time::Duration};

/// What a reader does with a line that looks like data but cannot be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseMode {
	/// Abort on the first malformed line.
	Strict,
	/// Log, count and skip malformed lines.
	#[default]
	Lenient,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CurlConfig {
	/// `curl -w` format description the log was written with.
	pub format_file: Option<PathBuf>,
	pub total_field: String,
	pub outage_min_ms: f64,
	pub outage_max_ms: f64,
}

impl Default for CurlConfig {
	fn default() -> Self {
		Self { format_file: None, total_field: crate::curl::DEFAULT_TOTAL_FIELD.into(), outage_min_ms: 3500.0, outage_max_ms: 30000.0 }
	}
}

impl CurlConfig {
	pub fn outage_rule(&self) -> OutageRule { OutageRule::band(self.outage_min_ms, self.outage_max_ms) }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AnalysisConfig {
	pub log_level: String,
	pub parse_mode: ParseMode,
	pub wrap_period: u64,
	/// Pings slower than this (or lost) count as outage.
	pub latency_threshold_ms: f64,
	pub window_secs: f64,
	pub alignment: Alignment,
	/// Rates are reported as outage seconds per this many seconds.
	pub rate_unit_secs: f64,
	pub quantile: f64,
	/// Only keep samples newer than this many seconds before now.
	pub history_secs: Option<u64>,
	pub curl: CurlConfig,
}

impl Default for AnalysisConfig {
	fn default() -> Self {
		Self {
			log_level: "info".into(),
			parse_mode: ParseMode::Lenient,
			wrap_period: DEFAULT_WRAP_PERIOD,
			latency_threshold_ms: 1000.0,
			window_secs: 300.0,
			alignment: Alignment::Centered,
			rate_unit_secs: 60.0,
			quantile: 0.99,
			history_secs: None,
			curl: CurlConfig::default(),
		}
	}
}

impl AnalysisConfig {
	pub fn builder() -> AnalysisConfigBuilder { AnalysisConfigBuilder::default() }

	pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
		let data = fs::read_to_string(path)?;
		let cfg: Self = toml::from_str(&data).map_err(|e| Error::config(format!("toml parse error: {e}")))?;
		cfg.validate()?;
		Ok(cfg)
	}

	pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
		let s = toml::to_string_pretty(self).map_err(|e| Error::config(format!("toml serialize error: {e}")))?;
		fs::write(path, s)?;
		Ok(())
	}

	/// Defaults overridden by `PINGSCOPE_*` environment variables.
	pub fn from_env() -> Result<Self> {
		let mut cfg = Self::default();
		cfg.apply_env()?;
		cfg.validate()?;
		Ok(cfg)
	}

	pub fn apply_env(&mut self) -> Result<()> {
		if let Ok(v) = std::env::var("PINGSCOPE_LOG_LEVEL") { self.log_level = v; }
		if let Ok(v) = std::env::var("PINGSCOPE_PARSE_MODE") {
			self.parse_mode = match v.to_ascii_lowercase().as_str() {
				"strict" => ParseMode::Strict,
				"lenient" => ParseMode::Lenient,
				_ => return Err(Error::config(format!("invalid PINGSCOPE_PARSE_MODE: {v}"))),
			};
		}
		if let Some(v) = env_num("PINGSCOPE_LATENCY_THRESHOLD_MS")? { self.latency_threshold_ms = v; }
		if let Some(v) = env_num("PINGSCOPE_WINDOW_SECS")? { self.window_secs = v; }
		if let Some(v) = env_num("PINGSCOPE_HISTORY_SECS")? { self.history_secs = Some(v); }
		if let Some(v) = env_num("PINGSCOPE_WRAP_PERIOD")? { self.wrap_period = v; }
		Ok(())
	}

	pub fn validate(&self) -> Result<()> {
		let allowed = ["trace", "debug", "info", "warn", "error"];
		if !allowed.contains(&self.log_level.as_str()) {
			return Err(Error::config(format!("invalid log_level: {}", self.log_level)));
		}
		if self.wrap_period == 0 {
			return Err(Error::config("wrap_period must be positive"));
		}
		if !(self.window_secs.is_finite() && self.window_secs > 0.0) {
			return Err(Error::config(format!("invalid window_secs: {}", self.window_secs)));
		}
		if !(self.rate_unit_secs.is_finite() && self.rate_unit_secs > 0.0) {
			return Err(Error::config(format!("invalid rate_unit_secs: {}", self.rate_unit_secs)));
		}
		if !(0.0..=1.0).contains(&self.quantile) {
			return Err(Error::config(format!("quantile must be within [0, 1]: {}", self.quantile)));
		}
		if self.latency_threshold_ms.is_nan() {
			return Err(Error::config("latency_threshold_ms is NaN"));
		}
		if !(self.curl.outage_min_ms < self.curl.outage_max_ms) {
			return Err(Error::config("curl outage band is empty"));
		}
		if self.curl.total_field.is_empty() {
			return Err(Error::config("curl total_field is empty"));
		}
		Ok(())
	}

	pub fn window(&self) -> Result<Window> {
		let d = Duration::try_from_secs_f64(self.window_secs).map_err(|e| Error::config(format!("invalid window_secs: {e}")))?;
		Window::new(d, self.alignment)
	}

	pub fn aggregator(&self) -> Result<RollingAggregator> { Ok(RollingAggregator::new(self.window()?, self.rate_unit_secs)) }

	pub fn ping_outage_rule(&self) -> OutageRule { OutageRule::above(self.latency_threshold_ms) }

	pub fn ping_options(&self) -> crate::ping::PingOptions {
		crate::ping::PingOptions { mode: self.parse_mode, wrap_period: self.wrap_period }
	}
}

fn env_num<T: std::str::FromStr>(key: &str) -> Result<Option<T>> {
	match std::env::var(key) {
		Ok(v) => v.trim().parse().map(Some).map_err(|_| Error::config(format!("invalid {key}: {v}"))),
		Err(_) => Ok(None),
	}
}

#[derive(Debug, Default)]
pub struct AnalysisConfigBuilder {
	cfg: AnalysisConfig,
}

impl AnalysisConfigBuilder {
	pub fn log_level(mut self, level: impl Into<String>) -> Self { self.cfg.log_level = level.into(); self }
	pub fn parse_mode(mut self, mode: ParseMode) -> Self { self.cfg.parse_mode = mode; self }
	pub fn wrap_period(mut self, period: u64) -> Self { self.cfg.wrap_period = period; self }
	pub fn latency_threshold_ms(mut self, ms: f64) -> Self { self.cfg.latency_threshold_ms = ms; self }
	pub fn window_secs(mut self, secs: f64) -> Self { self.cfg.window_secs = secs; self }
	pub fn alignment(mut self, alignment: Alignment) -> Self { self.cfg.alignment = alignment; self }
	pub fn rate_unit_secs(mut self, secs: f64) -> Self { self.cfg.rate_unit_secs = secs; self }
	pub fn quantile(mut self, q: f64) -> Self { self.cfg.quantile = q; self }
	pub fn history_secs(mut self, secs: Option<u64>) -> Self { self.cfg.history_secs = secs; self }
	pub fn curl(mut self, curl: CurlConfig) -> Self { self.cfg.curl = curl; self }

	pub fn build(self) -> Result<AnalysisConfig> {
		self.cfg.validate()?;
		Ok(self.cfg)
	}
}
