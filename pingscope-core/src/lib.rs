#![forbid(unsafe_code)]
//! Network-health telemetry core.
//!
//! Ping text logs are parsed into samples, their ICMP sequence numbers are
//! unwrapped into a global order, and the samples become a duration-weighted
//! series for rolling outage rates and latency quantiles. Samples can also be
//! archived as fixed-width binary records and tailed cheaply. curl timing logs
//! feed the same series builder directly.

pub mod config;
pub mod curl;
pub mod error;
pub mod ping;
pub mod record;
pub mod rolling;
pub mod sequence;
pub mod series;
pub mod stats;
pub mod types;

pub use config::{AnalysisConfig, CurlConfig, ParseMode};
pub use curl::{CurlFormat, CurlLog, CurlReader};
pub use error::{Error, Result};
pub use ping::{read_ping_log, ParseReport, PingLog, PingOptions};
pub use record::{tail_records, Record, RecordFile, RecordWriter, RECORD_WIDTH};
pub use rolling::{Alignment, RollingAggregator, TrendPoint, Window};
pub use sequence::SequenceUnwrapper;
pub use series::{Series, WeightedPoint};
pub use stats::{OutageRule, Summary};
pub use types::{RawSample, Timestamp, UnwrappedSample};
