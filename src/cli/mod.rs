//! CLI mode for parallel-dl: argument parsing and a rendered batch run.

mod progress;

use std::path::PathBuf;
use std::sync::Arc;

use indicatif::MultiProgress;
use tokio_util::sync::CancellationToken;

use crate::{
    AppConfig, BatchStats, DownloadProgress, DownloadRequest, Downloader, Error, FileStats,
    Result, format_bytes, format_duration,
};

pub use progress::{make_progress_bar, print_summary, render, sync_bars};

/// Number of requests in a batch when `--count` is not given.
pub const DEFAULT_COUNT: usize = 5;

/// Options collected from the command line. `None` leaves the config file value in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliArgs {
    pub count: usize,
    pub concurrent_files: Option<usize>,
    pub source_url: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub settle_ms: Option<u64>,
    pub config_path: Option<PathBuf>,
    pub json: bool,
}

impl Default for CliArgs {
    fn default() -> Self {
        Self {
            count: DEFAULT_COUNT,
            concurrent_files: None,
            source_url: None,
            output_dir: None,
            settle_ms: None,
            config_path: None,
            json: false,
        }
    }
}

impl CliArgs {
    /// Loads the config file and applies command-line overrides on top.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed.
    pub fn resolve_config(&self) -> Result<AppConfig> {
        let path = self
            .config_path
            .clone()
            .unwrap_or_else(AppConfig::default_path);
        let mut config = AppConfig::load(&path)?;

        if let Some(n) = self.concurrent_files {
            config.download.concurrent_files = n;
        }
        if let Some(url) = &self.source_url {
            config.download.source_url.clone_from(url);
        }
        if let Some(dir) = &self.output_dir {
            config.download.output_dir.clone_from(dir);
        }
        if let Some(ms) = self.settle_ms {
            config.download.settle_delay_ms = ms;
        }
        Ok(config)
    }
}

/// What the command line asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Run(CliArgs),
    Help,
}

fn value<I: Iterator<Item = String>>(args: &mut I, flag: &str) -> Result<String> {
    args.next()
        .ok_or_else(|| Error::Config(format!("{flag} expects a value")))
}

fn number<T: std::str::FromStr, I: Iterator<Item = String>>(args: &mut I, flag: &str) -> Result<T> {
    let raw = value(args, flag)?;
    raw.parse()
        .map_err(|_| Error::Config(format!("{flag}: '{raw}' is not a valid number")))
}

/// Parses command-line arguments, excluding the program name.
///
/// # Errors
///
/// Returns [`Error::Config`] on unknown options, missing values or
/// malformed numbers.
pub fn parse_args<I>(args: I) -> Result<Command>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter();
    let mut cli = CliArgs::default();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-n" | "--count" => cli.count = number(&mut args, &arg)?,
            "-j" | "--concurrent" => cli.concurrent_files = Some(number(&mut args, &arg)?),
            "-u" | "--url" => cli.source_url = Some(value(&mut args, &arg)?),
            "-o" | "--output" => cli.output_dir = Some(PathBuf::from(value(&mut args, &arg)?)),
            "--settle-ms" => cli.settle_ms = Some(number(&mut args, &arg)?),
            "-c" | "--config" => cli.config_path = Some(PathBuf::from(value(&mut args, &arg)?)),
            "--json" => cli.json = true,
            "-h" | "--help" => return Ok(Command::Help),
            other => return Err(Error::Config(format!("Unknown option: {other}"))),
        }
    }

    Ok(Command::Run(cli))
}

/// Prints usage to stderr.
pub fn print_usage() {
    eprintln!("Usage: parallel-dl [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -n, --count <N>        Files to download (default: {DEFAULT_COUNT})");
    eprintln!(
        "  -j, --concurrent <N>   Concurrent downloads (default: {})",
        crate::config::DEFAULT_CONCURRENT_FILES
    );
    eprintln!(
        "  -u, --url <URL>        Source URL (default: {})",
        crate::config::DEFAULT_SOURCE_URL
    );
    eprintln!("  -o, --output <DIR>     Directory to save files into (default: .)");
    eprintln!("      --settle-ms <MS>   Pause after each delivery before freeing the slot");
    eprintln!(
        "  -c, --config <PATH>    Config file (default: {})",
        AppConfig::default_path().display()
    );
    eprintln!("      --json             Print the final progress records as JSON");
    eprintln!("  -h, --help             Show this help");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  RUST_LOG               Log filter (default: warn)");
}

/// Prints a line per settled file above the bars.
struct CliProgress {
    multi: MultiProgress,
}

impl DownloadProgress for CliProgress {
    fn on_admitted(&self, request: &DownloadRequest, running: usize) {
        log::debug!("{} admitted ({running} running)", request.file_name);
    }

    fn on_settled(&self, request: &DownloadRequest, result: &Result<FileStats>, _running: usize) {
        let line = match result {
            Ok(stats) => format!(
                "  {} - {} in {} ({}/s avg)",
                request.file_name,
                format_bytes(stats.size),
                format_duration(stats.elapsed),
                format_bytes(stats.average_speed),
            ),
            Err(e) => format!("  {} - failed: {e}", request.file_name),
        };
        let _ = self.multi.println(line);
    }
}

/// Runs one batch with live progress bars and prints a summary.
///
/// # Errors
///
/// Returns an error if the configuration is invalid or the HTTP client
/// cannot be built. Individual download failures are reported in the
/// returned stats.
pub async fn run(args: CliArgs) -> Result<BatchStats> {
    let config = args.resolve_config()?;
    config.download.validate()?;

    let downloader = Downloader::new(config.download)?;
    let multi = MultiProgress::new();
    let token = CancellationToken::new();
    let renderer = tokio::spawn(render(
        Arc::clone(downloader.store()),
        multi.clone(),
        token.clone(),
    ));

    let observer: Arc<dyn DownloadProgress> = Arc::new(CliProgress {
        multi: multi.clone(),
    });
    let result = downloader.download_batch(args.count, &observer).await;

    token.cancel();
    if let Err(e) = renderer.await {
        log::warn!("Progress renderer stopped abnormally: {e}");
    }
    multi.clear().ok();

    let stats = result?;
    let records = downloader.store().snapshot();

    if args.json {
        match serde_json::to_string_pretty(&records) {
            Ok(json) => println!("{json}"),
            Err(e) => log::error!("Failed to serialize progress records: {e}"),
        }
    }
    print_summary(&stats, &records);

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn parse(args: &[&str]) -> Result<Command> {
        parse_args(args.iter().map(ToString::to_string))
    }

    #[test]
    fn no_args_uses_defaults() {
        assert_eq!(parse(&[]).unwrap(), Command::Run(CliArgs::default()));
    }

    #[test]
    fn all_flags() {
        let Command::Run(cli) = parse(&[
            "-n", "8", "-j", "2", "-u", "http://example.com/a.png", "-o", "out", "--settle-ms",
            "300", "-c", "cfg.toml", "--json",
        ])
        .unwrap() else {
            panic!("expected run");
        };

        assert_eq!(cli.count, 8);
        assert_eq!(cli.concurrent_files, Some(2));
        assert_eq!(cli.source_url.as_deref(), Some("http://example.com/a.png"));
        assert_eq!(cli.output_dir, Some(PathBuf::from("out")));
        assert_eq!(cli.settle_ms, Some(300));
        assert_eq!(cli.config_path, Some(PathBuf::from("cfg.toml")));
        assert!(cli.json);
    }

    #[test]
    fn long_forms() {
        let Command::Run(cli) = parse(&["--count", "0", "--concurrent", "1"]).unwrap() else {
            panic!("expected run");
        };
        assert_eq!(cli.count, 0);
        assert_eq!(cli.concurrent_files, Some(1));
    }

    #[test]
    fn help_wins() {
        assert_eq!(parse(&["-n", "3", "--help"]).unwrap(), Command::Help);
    }

    #[test]
    fn bad_input_is_config_error() {
        assert!(matches!(parse(&["--bogus"]), Err(Error::Config(_))));
        assert!(matches!(parse(&["-n"]), Err(Error::Config(_))));
        assert!(matches!(parse(&["-j", "three"]), Err(Error::Config(_))));
        assert!(matches!(parse(&["-n", "-1"]), Err(Error::Config(_))));
    }

    #[test]
    fn flags_override_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[download]\nconcurrent_files = 7\nsettle_delay_ms = 20\noutput_dir = \"from-file\""
        )
        .unwrap();

        let cli = CliArgs {
            concurrent_files: Some(2),
            config_path: Some(file.path().to_path_buf()),
            ..CliArgs::default()
        };
        let config = cli.resolve_config().unwrap();

        assert_eq!(config.download.concurrent_files, 2);
        assert_eq!(config.download.settle_delay_ms, 20);
        assert_eq!(config.download.output_dir, PathBuf::from("from-file"));
    }

    #[test]
    fn missing_config_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cli = CliArgs {
            config_path: Some(dir.path().join("absent.toml")),
            ..CliArgs::default()
        };
        assert_eq!(cli.resolve_config().unwrap(), AppConfig::default());
    }
}
