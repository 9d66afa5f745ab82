/// `TraceCrab` - A stack-trace aware error analyzer for server logs
///
/// Copyright (C) 2025 Daniel Freiermuth
///
/// This program is free software: you can redistribute it and/or modify
/// it under the terms of the GNU General Public License as published by
/// the Free Software Foundation, either version 3 of the License, or
/// (at your option) any later version.
///
/// This program is distributed in the hope that it will be useful,
/// but WITHOUT ANY WARRANTY; without even the implied warranty of
/// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
/// GNU General Public License for more details.
///
/// You should have received a copy of the GNU General Public License
/// along with this program.  If not, see <https://www.gnu.org/licenses/>.
use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate, NaiveDateTime, TimeDelta};
use clap::{Parser, ValueEnum};
use std::path::{Path, PathBuf};
use tracecrab::export;
use tracecrab::source::sample::SampleCatalog;
use tracecrab::source::{fetch_once, FetchQuery, SourceConfig};
use tracecrab::{AnalysisConfig, AnalysisReport, ErrorAnalyzer, LogLevel};
use tracing_subscriber::EnvFilter;

#[cfg(feature = "ram-profiling")]
#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SourceKind {
    File,
    Elk,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Summary,
    Detailed,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "tracecrab")]
#[command(author = "TraceCrab Team")]
#[command(version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("GIT_HASH"), ")"))]
#[command(about = "Analyze server logs for exceptions, error bursts and hotspots", long_about = None)]
struct Args {
    /// Where to read logs from
    #[arg(short, long, value_enum, default_value_t = SourceKind::File)]
    source: SourceKind,

    /// Log file or ZIP archive (file source)
    #[arg(short, long, value_name = "FILE")]
    input: Option<PathBuf>,

    /// Elasticsearch base URL (elk source)
    #[arg(long, default_value = "http://localhost:9200")]
    url: String,

    /// Elasticsearch index pattern (elk source)
    #[arg(long, default_value = "logs-*")]
    index: String,

    #[arg(long)]
    username: Option<String>,

    #[arg(long)]
    password: Option<String>,

    /// Analyze a named sample dataset from the config file instead of a source
    #[arg(long, value_name = "NAME", conflicts_with = "input")]
    sample: Option<String>,

    /// Start of the time range (YYYY-MM-DD HH:MM:SS)
    #[arg(long, value_parser = parse_time)]
    start_time: Option<NaiveDateTime>,

    /// End of the time range (YYYY-MM-DD HH:MM:SS)
    #[arg(long, value_parser = parse_time)]
    end_time: Option<NaiveDateTime>,

    /// Only the last N hours
    #[arg(long, conflicts_with_all = ["start_time", "last_days"])]
    last_hours: Option<u32>,

    /// Only the last N days
    #[arg(long, conflicts_with = "start_time")]
    last_days: Option<u32>,

    /// Only entries at this level (e.g. 심각, SEVERE, ERROR)
    #[arg(long, value_parser = parse_level)]
    level: Option<LogLevel>,

    /// Only entries with this fully qualified exception type
    #[arg(long)]
    exception: Option<String>,

    /// Only entries whose thread name matches this regex
    #[arg(long)]
    thread_pattern: Option<String>,

    /// Time-series window width in seconds
    #[arg(long)]
    window_secs: Option<i64>,

    /// Config file (defaults to the per-user config)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Write hotspot tables as CSV
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Write the analyzed entries as CSV
    #[arg(long, value_name = "FILE")]
    entries: Option<PathBuf>,

    /// Write summary, bursts, patterns and hotspots as JSON
    #[arg(short, long, value_name = "FILE")]
    metrics: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Summary)]
    format: OutputFormat,

    /// Path for the DHAT heap profiling output (only used when built with --features ram-profiling)
    #[cfg(feature = "ram-profiling")]
    #[arg(
        long = "profile-output",
        value_name = "PROFILE_FILE",
        default_value = "dhat-heap.json"
    )]
    profile_output: PathBuf,
}

fn parse_time(value: &str) -> Result<NaiveDateTime, String> {
    let value = value.trim();
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .map(|d| d.and_time(chrono::NaiveTime::MIN))
        })
        .ok_or_else(|| format!("'{value}' is not a timestamp (expected YYYY-MM-DD HH:MM:SS)"))
}

fn parse_level(value: &str) -> Result<LogLevel, String> {
    let level = LogLevel::from_token(value);
    if level == LogLevel::Unknown {
        return Err(format!("unknown level '{value}'"));
    }
    Ok(level)
}

/// Fold the command line into the loaded config. Flags win over the file.
fn apply_overrides(config: &mut AnalysisConfig, args: &Args) {
    let now = Local::now().naive_local();
    let relative = args
        .last_hours
        .map(|h| TimeDelta::hours(i64::from(h)))
        .or_else(|| args.last_days.map(|d| TimeDelta::days(i64::from(d))));

    if let Some(span) = relative {
        config.filter.start = Some(now - span);
    }
    if args.start_time.is_some() {
        config.filter.start = args.start_time;
    }
    if args.end_time.is_some() {
        config.filter.end = args.end_time;
    }
    if args.level.is_some() {
        config.filter.level = args.level;
    }
    if let Some(exception) = &args.exception {
        config.filter.exception_type = Some(exception.clone());
    }
    if let Some(pattern) = &args.thread_pattern {
        config.filter.thread_pattern = Some(pattern.clone());
    }
    if let Some(window_secs) = args.window_secs {
        config.window_secs = window_secs;
    }
}

fn load_config(args: &Args) -> Result<AnalysisConfig> {
    let mut config = match &args.config {
        Some(path) => AnalysisConfig::load_from(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => AnalysisConfig::load(),
    };
    apply_overrides(&mut config, args);
    Ok(config)
}

fn run_analysis(analyzer: &ErrorAnalyzer, args: &Args) -> Result<AnalysisReport> {
    if let Some(name) = &args.sample {
        let catalog = SampleCatalog::new(analyzer.config().datasets.clone());
        return analyzer
            .analyze_sample(&catalog, name)
            .with_context(|| format!("Failed to analyze sample '{name}'"));
    }

    let source_config = match args.source {
        SourceKind::File => {
            let Some(path) = &args.input else {
                bail!("--input is required for the file source");
            };
            SourceConfig::File { path: path.clone() }
        }
        SourceKind::Elk => SourceConfig::Elasticsearch {
            url: args.url.clone(),
            index: args.index.clone(),
            username: args.username.clone(),
            password: args.password.clone(),
        },
    };

    let mut source = source_config.open(analyzer.parser().extractor());
    let query = FetchQuery {
        start: analyzer.config().filter.start,
        end: analyzer.config().filter.end,
        ..FetchQuery::default()
    };
    tracing::info!("Fetching logs from {}", source.name());
    let fetched = fetch_once(source.as_mut(), &query)
        .with_context(|| format!("Failed to fetch logs from {}", source.name()))?;
    if fetched.is_empty() {
        tracing::warn!("No logs found matching the criteria");
    }

    Ok(analyzer.analyze_fetched(&fetched))
}

fn write_file(path: &Path, contents: &str, what: &str) -> Result<()> {
    std::fs::write(path, contents)
        .with_context(|| format!("Failed to write {what} to {}", path.display()))?;
    tracing::info!("Saved {what} to {}", path.display());
    Ok(())
}

fn main() -> Result<()> {
    // Set RUST_LOG to override (e.g., RUST_LOG=tracecrab=debug)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!(
        "TraceCrab starting up (version {}, {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH")
    );

    let args = Args::parse();

    #[cfg(feature = "ram-profiling")]
    let _profiler = {
        tracing::info!("RAM profiling enabled, output: {:?}", args.profile_output);
        dhat::Profiler::builder()
            .file_name(args.profile_output.clone())
            .build()
    };

    #[cfg(feature = "cpu-profiling")]
    let _tracy = {
        tracing::info!("CPU profiling enabled with Tracy - run Tracy profiler to connect");
        tracy_client::Client::start()
    };

    let config = load_config(&args)?;
    let analyzer = ErrorAnalyzer::new(config).context("Invalid configuration")?;
    let report = run_analysis(&analyzer, &args)?;

    match args.format {
        OutputFormat::Summary => print!("{}", export::render_summary(&report)),
        OutputFormat::Detailed => print!("{}", export::render_detailed(&report)),
        OutputFormat::Json => println!(
            "{}",
            export::metrics_to_json(&report).context("Failed to serialize metrics")?
        ),
    }

    if let Some(path) = &args.output {
        write_file(path, &export::hotspots_to_csv(&report.hotspots), "hotspot tables")?;
    }
    if let Some(path) = &args.entries {
        write_file(path, &export::entries_to_csv(&report.entries), "entries")?;
    }
    if let Some(path) = &args.metrics {
        let json = export::metrics_to_json(&report).context("Failed to serialize metrics")?;
        write_file(path, &json, "metrics")?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_time_formats() {
        let expected = NaiveDateTime::parse_from_str("2025-06-10 08:00:00", "%Y-%m-%d %H:%M:%S")
            .expect("valid timestamp");
        assert_eq!(parse_time("2025-06-10 08:00:00"), Ok(expected));
        assert_eq!(parse_time("2025-06-10T08:00:00"), Ok(expected));
        assert_eq!(
            parse_time("2025-06-10").map(|t| t.format("%H:%M:%S").to_string()),
            Ok("00:00:00".to_string())
        );
        assert!(parse_time("yesterday").is_err());
    }

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("심각"), Ok(LogLevel::Severe));
        assert_eq!(parse_level("warn"), Ok(LogLevel::Warning));
        assert!(parse_level("loud").is_err());
    }

    #[test]
    fn test_flags_override_config() {
        let args = Args::parse_from([
            "tracecrab",
            "--input",
            "x.log",
            "--level",
            "ERROR",
            "--exception",
            "java.sql.SQLException",
            "--window-secs",
            "300",
            "--start-time",
            "2025-06-10 00:00:00",
        ]);
        let mut config = AnalysisConfig::default();
        config.filter.thread_pattern = Some("exec".to_string());
        apply_overrides(&mut config, &args);

        assert_eq!(config.window_secs, 300);
        assert_eq!(config.filter.level, Some(LogLevel::Severe));
        assert_eq!(
            config.filter.exception_type.as_deref(),
            Some("java.sql.SQLException")
        );
        assert_eq!(config.filter.thread_pattern.as_deref(), Some("exec"));
        assert!(config.filter.start.is_some());
        assert!(config.filter.end.is_none());
    }

    #[test]
    fn test_last_hours_leaves_end_open() {
        let args = Args::parse_from(["tracecrab", "--input", "x.log", "--last-hours", "24"]);
        let mut config = AnalysisConfig::default();
        apply_overrides(&mut config, &args);
        let start = config.filter.start.expect("start set");
        let age = Local::now().naive_local() - start;
        assert!(age >= TimeDelta::hours(24) && age < TimeDelta::hours(25));
        assert!(config.filter.end.is_none());
    }

    #[test]
    fn test_last_days_keeps_explicit_end() {
        let args = Args::parse_from([
            "tracecrab",
            "--input",
            "x.log",
            "--last-days",
            "2",
            "--end-time",
            "2099-01-01 00:00:00",
        ]);
        let mut config = AnalysisConfig::default();
        apply_overrides(&mut config, &args);
        assert!(config.filter.start.is_some());
        assert_eq!(
            config.filter.end.map(|end| end.date()),
            NaiveDate::from_ymd_opt(2099, 1, 1)
        );
    }

    #[test]
    fn test_sample_conflicts_with_input() {
        assert!(Args::try_parse_from(["tracecrab", "--input", "x.log", "--sample", "v2"]).is_err());
    }
}
