#![forbid(unsafe_code)]

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use pingscope_core::{Alignment, AnalysisConfig, ParseMode};
use std::path::PathBuf;
use tracing::debug;

mod commands;
mod render;

use render::Output;

#[derive(Debug, Parser)]
#[command(name = "pingscope", version, about = "Outage rate and latency trends from ping and curl logs")]
struct Cli {
	/// TOML config file (default: $PINGSCOPE_CONFIG, else built-in defaults)
	#[arg(long, global = true)]
	config: Option<PathBuf>,
	/// Output format
	#[arg(long, value_enum, default_value_t = Output::Table, global = true)]
	output: Output,
	/// Abort on the first malformed log line instead of skipping it
	#[arg(long, global = true)]
	strict: bool,
	/// How many seconds of history to process
	#[arg(short = 't', long = "time", value_name = "SECONDS", global = true)]
	history_secs: Option<u64>,

	#[command(subcommand)]
	command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
	/// Rolling outage rate and latency quantile of a ping log
	Trend {
		file: PathBuf,
		/// Read FILE as a binary record archive instead of ping text
		#[arg(long)]
		binary: bool,
		/// Only use the last N records of a binary archive
		#[arg(long, requires = "binary")]
		tail: Option<u64>,
		/// Minimum latency for a ping to count as an outage
		#[arg(short = 'l', long, value_name = "MILLISECONDS")]
		latency_threshold: Option<f64>,
		/// Window size for the rolling statistics
		#[arg(short = 'w', long, value_name = "SECONDS")]
		window: Option<f64>,
		/// Use trailing windows instead of centered ones
		#[arg(long)]
		trailing: bool,
		/// Quantile to trend, in [0, 1]
		#[arg(short = 'q', long)]
		quantile: Option<f64>,
	},
	/// Append the samples of a ping text log to a binary record archive
	Convert {
		input: PathBuf,
		#[arg(id = "output_file", value_name = "OUTPUT")]
		output: PathBuf,
	},
	/// Print the last records of a binary archive
	Tail {
		file: PathBuf,
		#[arg(short = 'n', long, default_value_t = 10)]
		count: u64,
	},
	/// Time-weighted statistics over a ping log and a curl log
	Report {
		#[arg(short = 'p', long)]
		ping: PathBuf,
		#[arg(short = 'c', long)]
		curl: PathBuf,
		/// curl -w format description the curl log was written with
		#[arg(long)]
		format_file: Option<PathBuf>,
		#[command(subcommand)]
		kind: ReportKind,
	},
	/// Config helpers
	Config {
		#[command(subcommand)]
		action: ConfigCmd,
	},
}

#[derive(Debug, Subcommand)]
enum ReportKind {
	/// Weighted cumulative distribution of curl time and ping latency
	Cdf,
	/// curl outage share per hour of day
	TimeOfDay,
	/// Point counts, spans, outage share and quantiles
	Summary,
}

#[derive(Debug, Subcommand)]
enum ConfigCmd {
	/// Show the effective config
	Show,
	/// Write a config file with the defaults
	WriteTemplate {
		#[arg(long)]
		path: Option<PathBuf>,
		#[arg(long)]
		force: bool,
	},
}

fn load_config(cli: &Cli) -> anyhow::Result<AnalysisConfig> {
	let path = cli.config.clone().or_else(|| std::env::var_os("PINGSCOPE_CONFIG").map(PathBuf::from));
	let mut cfg = match path {
		Some(p) => AnalysisConfig::load_from_file(&p).with_context(|| format!("config {}", p.display()))?,
		None => AnalysisConfig::default(),
	};
	cfg.apply_env()?;
	if cli.strict { cfg.parse_mode = ParseMode::Strict; }
	if cli.history_secs.is_some() { cfg.history_secs = cli.history_secs; }
	if let Commands::Trend { latency_threshold, window, trailing, quantile, .. } = &cli.command {
		if let Some(v) = latency_threshold { cfg.latency_threshold_ms = *v; }
		if let Some(v) = window { cfg.window_secs = *v; }
		if *trailing { cfg.alignment = Alignment::Trailing; }
		if let Some(v) = quantile { cfg.quantile = *v; }
	}
	cfg.validate()?;
	Ok(cfg)
}

fn init_tracing(level: &str) {
	let level = std::env::var("RUST_LOG").ok().and_then(|v| v.parse().ok()).or_else(|| level.parse().ok()).unwrap_or(tracing::Level::INFO);
	let _ = tracing_subscriber::fmt().with_max_level(level).with_target(false).with_writer(std::io::stderr).try_init();
}

fn main() -> anyhow::Result<()> {
	let cli = Cli::parse();
	let cfg = load_config(&cli)?;
	init_tracing(&cfg.log_level);
	debug!(?cfg, "effective config");

	let rows = match &cli.command {
		Commands::Trend { file, binary, tail, .. } => {
			let series = if *binary { commands::load_ping_archive(&cfg, file, *tail)? } else { commands::load_ping_text(&cfg, file)? };
			commands::trend(&cfg, &series)?
		}
		Commands::Convert { input, output } => commands::convert(&cfg, input, output)?,
		Commands::Tail { file, count } => commands::tail(file, *count)?,
		Commands::Report { ping, curl, format_file, kind } => {
			let ping = commands::load_ping_text(&cfg, ping)?;
			let curl = commands::load_curl(&cfg, curl, format_file.as_deref())?;
			match kind {
				ReportKind::Cdf => commands::cdf(&cfg, &ping, &curl)?,
				ReportKind::TimeOfDay => commands::time_of_day(&cfg, &curl),
				ReportKind::Summary => commands::summary(&cfg, &ping, &curl),
			}
		}
		Commands::Config { action } => {
			match action {
				ConfigCmd::Show => print!("{}", toml::to_string_pretty(&cfg)?),
				ConfigCmd::WriteTemplate { path, force } => {
					let path = path.clone().unwrap_or_else(|| PathBuf::from("pingscope.toml"));
					if path.exists() && !force {
						bail!("refusing to overwrite existing file: {} (use --force)", path.display());
					}
					AnalysisConfig::default().write_to_file(&path)?;
					eprintln!("wrote {}", path.display());
				}
			}
			return Ok(());
		}
	};
	debug!(rows = rows.len(), "rendering");
	println!("{}", rows.render(cli.output)?);
	Ok(())
}
