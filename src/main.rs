use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use reqwest::Url;
use tokio_util::sync::CancellationToken;

use tilestitch::browser::{BrowserSession, DriverSession, HarSession, SessionError};
use tilestitch::config::{self, Config};
use tilestitch::pipeline::{self, Pipeline, PipelineError};
use tilestitch::util;

#[derive(Debug, Parser)]
#[command(
    name = "tilestitch",
    version,
    about = "Rebuild a large image from the tiles a web page loads"
)]
struct Cli {
    /// Config file (default: ./tilestitch.toml, then ~/.tilestitch/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Data directory for config and logs (default: ~/.tilestitch)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Append logs to ~/.tilestitch/logs/tilestitch.log instead of stderr
    #[arg(long, global = true)]
    log_file: bool,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Watch the page, download its tiles and compose the mosaic
    Run {
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        store: StoreArgs,
        /// Output image path
        #[arg(long)]
        output: Option<PathBuf>,
        /// Write a JSON summary of the run
        #[arg(long)]
        summary_json: Option<PathBuf>,
    },
    /// Only watch the page and list the tile URLs it loads
    Discover {
        #[command(flatten)]
        source: SourceArgs,
        /// Write the URL list here instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Download the tiles of a URL list into the cache
    Fetch {
        /// File with one tile URL per line
        #[arg(long)]
        urls: PathBuf,
        #[command(flatten)]
        store: StoreArgs,
    },
    /// Compose the cached tiles into one image
    Compose {
        #[arg(long)]
        cache_dir: Option<PathBuf>,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Write an example config file
    InitConfig {
        /// Destination (default: ./tilestitch.toml)
        path: Option<PathBuf>,
        #[arg(long)]
        force: bool,
    },
}

#[derive(Debug, Args)]
struct SourceArgs {
    /// Target page URL (overrides the URL file)
    #[arg(long)]
    url: Option<String>,
    /// File whose first line is the target page URL
    #[arg(long)]
    url_file: Option<PathBuf>,
    /// Replay a recorded HAR file instead of driving a browser
    #[arg(long, conflicts_with = "driver")]
    har: Option<PathBuf>,
    /// Browser driver command (overrides [browser].command)
    #[arg(long)]
    driver: Option<String>,
    /// Seconds to watch traffic after the page loads
    #[arg(long)]
    window: Option<f64>,
}

#[derive(Debug, Args)]
struct StoreArgs {
    /// Tile cache directory
    #[arg(long)]
    cache_dir: Option<PathBuf>,
    /// Parallel downloads
    #[arg(long)]
    concurrency: Option<usize>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    util::init_data_dir(cli.data_dir.clone());

    if let Err(e) = init_logging(&cli) {
        eprintln!("Failed to initialize logging: {e:#}");
        return ExitCode::FAILURE;
    }

    match dispatch(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let code = err
                .downcast_ref::<PipelineError>()
                .map(PipelineError::exit_code)
                .unwrap_or(1);
            tracing::error!(error = %format!("{err:#}"), "Run failed");
            eprintln!("Error: {err:#}");
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}

fn init_logging(cli: &Cli) -> Result<()> {
    let level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(format!("tilestitch={level}").parse()?);
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    if cli.log_file {
        // Initialize logging to file (~/.tilestitch/logs/tilestitch.log)
        fs::create_dir_all(util::logs_dir())?;
        let log_file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(util::log_file_path())?;
        builder.with_writer(log_file).with_ansi(false).init();
    } else {
        builder.with_writer(std::io::stderr).init();
    }
    Ok(())
}

/// Cancel the run on Ctrl-C
fn cancel_on_interrupt() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, stopping after in-flight work");
            token.cancel();
        }
    });
    cancel
}

async fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Command::InitConfig { path, force } => {
            let path = path.unwrap_or_else(|| PathBuf::from(config::LOCAL_CONFIG_FILE));
            config::write_example_config(&path, force)?;
            println!("Wrote {}", path.display());
            Ok(())
        }
        Command::Run {
            source,
            store,
            output,
            summary_json,
        } => {
            let mut config = load_config(cli.config.as_deref(), Some(&source), Some(&store))?;
            if let Some(output) = output {
                config = config.with_output(output);
            }
            let target = resolve_target(&config, &source)?;
            let session = build_session(&config, &source)?;

            let pipeline = Pipeline::new(config).with_cancellation(cancel_on_interrupt());
            let summary = pipeline.run(session.as_ref(), &target).await?;

            if let Some(path) = summary_json {
                let json = serde_json::to_string_pretty(&summary)?;
                fs::write(&path, json)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
            }

            if summary.compose.has_mixed_prefixes() {
                eprintln!(
                    "Warning: the cache mixes {} tile sets; remove stale tiles for a clean mosaic",
                    summary.compose.prefixes.len()
                );
            }
            println!(
                "Saved {} ({}, {} tiles placed, {} downloaded, {} cached, {} failed)",
                summary.compose.output.display(),
                summary.compose.canvas,
                summary.compose.placed,
                summary.fetch.downloaded_count(),
                summary.fetch.cached_count(),
                summary.fetch.failed.len(),
            );
            Ok(())
        }
        Command::Discover { source, out } => {
            let config = load_config(cli.config.as_deref(), Some(&source), None)?;
            let target = resolve_target(&config, &source)?;
            let session = build_session(&config, &source)?;

            let pipeline = Pipeline::new(config).with_cancellation(cancel_on_interrupt());
            let observation = pipeline.discover(session.as_ref(), &target).await?;

            match out {
                Some(path) => {
                    pipeline::write_url_list(&path, &observation.urls)?;
                    println!("Wrote {} tile URLs to {}", observation.urls.len(), path.display());
                }
                None => {
                    for url in &observation.urls {
                        println!("{url}");
                    }
                }
            }
            Ok(())
        }
        Command::Fetch { urls, store } => {
            let config = load_config(cli.config.as_deref(), None, Some(&store))?;
            let urls = pipeline::read_url_list(&urls)?;

            let pipeline = Pipeline::new(config).with_cancellation(cancel_on_interrupt());
            let report = pipeline.fetch(&urls).await?;

            for failure in &report.failed {
                eprintln!("Failed: {} ({})", failure.url, failure.reason);
            }
            println!(
                "{} downloaded, {} cached, {} failed",
                report.downloaded_count(),
                report.cached_count(),
                report.failed.len()
            );
            Ok(())
        }
        Command::Compose { cache_dir, output } => {
            let mut config = load_config(cli.config.as_deref(), None, None)?;
            if let Some(dir) = cache_dir {
                config = config.with_cache_dir(dir);
            }
            if let Some(output) = output {
                config = config.with_output(output);
            }

            let report = Pipeline::new(config).compose().await?;
            if report.has_mixed_prefixes() {
                eprintln!(
                    "Warning: the cache mixes {} tile sets; remove stale tiles for a clean mosaic",
                    report.prefixes.len()
                );
            }
            println!(
                "Saved {} ({}, {} tiles placed, {} skipped)",
                report.output.display(),
                report.canvas,
                report.placed,
                report.skipped.len()
            );
            Ok(())
        }
    }
}

/// Load the config file and apply command-line overrides
fn load_config(
    path: Option<&Path>,
    source: Option<&SourceArgs>,
    store: Option<&StoreArgs>,
) -> Result<Config> {
    let mut config = Config::load(path)?;

    if let Some(source) = source {
        if let Some(url_file) = &source.url_file {
            config.url_file = url_file.clone();
        }
        if let Some(window) = source.window {
            let window = Duration::try_from_secs_f64(window)
                .with_context(|| format!("invalid --window {window}"))?;
            config = config.with_window(window);
        }
        if let Some(driver) = &source.driver {
            config.browser.command = Some(driver.clone());
        }
    }
    if let Some(store) = store {
        if let Some(dir) = &store.cache_dir {
            config = config.with_cache_dir(dir.clone());
        }
        if let Some(concurrency) = store.concurrency {
            config = config.with_concurrency(concurrency);
        }
    }

    Ok(config)
}

/// Target from `--url`, else the URL file.
///
/// HAR replays do not need a live target, so a missing URL file is fine there.
fn resolve_target(config: &Config, source: &SourceArgs) -> Result<Url> {
    if let Some(url) = &source.url {
        return Ok(config::parse_target_url(url)?);
    }
    if source.har.is_some() && !config.url_file.exists() {
        return Ok(Url::parse("about:blank")?);
    }
    Ok(config::read_target_url(&config.url_file).map_err(PipelineError::from)?)
}

fn build_session(config: &Config, source: &SourceArgs) -> Result<Box<dyn BrowserSession>> {
    if let Some(har) = &source.har {
        return Ok(Box::new(HarSession::new(har)));
    }

    let command = config
        .browser
        .command
        .as_deref()
        .ok_or(SessionError::NotConfigured)?;
    let session = DriverSession::new(command, config.browser.args.clone())?;
    Ok(Box::new(session))
}
