//! Command-line front end for the screen monitor.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::{ArgAction, Args, Parser, Subcommand};
use scout::monitor::{DEFAULT_TEMPLATE_THRESHOLD, DEFAULT_TEXT_THRESHOLD};
use scout::{extract_title, Config, ScreenMonitorService};
use vision::Region;

#[derive(Parser, Debug)]
#[command(name = "scout", version, about = "Find text and icons on screen and click them")]
struct Cli {
    /// Write annotated OCR snapshots to the debug directory
    #[arg(long, global = true, action = ArgAction::SetTrue)]
    debug: bool,
    /// Capture region as LEFT,TOP,WIDTH,HEIGHT (default: whole desktop)
    #[arg(long, global = true, value_name = "L,T,W,H", allow_hyphen_values = true)]
    region: Option<Region>,
    /// Config file (default: platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Locate text on screen
    Find(FindArgs),
    /// Locate an icon by template name
    Template(TemplateArgs),
    /// Send the paste shortcut to the focused window
    Paste,
    /// Run the capture loop and report its status
    Watch {
        #[arg(long, default_value_t = 10)]
        seconds: u64,
    },
    /// Print the title a command refers to
    Title { command: String },
}

#[derive(Args, Debug)]
struct FindArgs {
    query: String,
    #[arg(long, default_value_t = DEFAULT_TEXT_THRESHOLD)]
    threshold: f32,
    /// Click the match
    #[arg(long, action = ArgAction::SetTrue)]
    click: bool,
}

#[derive(Args, Debug)]
struct TemplateArgs {
    /// File name inside the template directory
    name: String,
    /// Only search around this absolute point
    #[arg(long, num_args = 2, value_names = ["X", "Y"], allow_negative_numbers = true)]
    near: Option<Vec<i32>>,
    #[arg(long, default_value_t = 60)]
    radius: u32,
    #[arg(long, default_value_t = DEFAULT_TEMPLATE_THRESHOLD)]
    threshold: f32,
    #[arg(long, action = ArgAction::SetTrue)]
    click: bool,
}

fn main() -> ExitCode {
    // Structured logging. Use `RUST_LOG=debug` etc.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(err) => {
            tracing::error!(error = %format!("{err:#}"), "scout failed");
            ExitCode::from(2)
        }
    }
}

fn load_config(cli: &Cli) -> Config {
    let mut cfg = match &cli.config {
        Some(path) => Config::load_from(path).unwrap_or_else(|err| {
            tracing::warn!(error = %format!("{err:#}"), "failed to load config; using defaults");
            Config::default()
        }),
        None => Config::load_or_default(),
    };
    if cli.debug {
        cfg.debug = true;
    }
    if cli.region.is_some() {
        cfg.region = cli.region;
    }
    cfg
}

/// `Ok(false)` means the target was not found or the action failed.
fn run(cli: Cli) -> Result<bool> {
    if let Commands::Title { command } = &cli.command {
        let title = extract_title(command);
        println!("{title}");
        return Ok(!title.is_empty());
    }

    let cfg = load_config(&cli);
    let service = ScreenMonitorService::from_config(&cfg)?;

    if let Commands::Paste = cli.command {
        return Ok(service.paste());
    }

    if !service.start() {
        anyhow::bail!("capture loop did not start");
    }
    if !service.wait_until_ready(cfg.ready_timeout()) {
        tracing::warn!("no frame captured yet");
    }

    let ok = match cli.command {
        Commands::Find(args) => match service.find_text(&args.query, args.threshold) {
            Some(m) => {
                println!("{}\t{}\t{:.3}\t{}", m.x, m.y, m.score, m.text);
                !args.click || service.click_at(m.x, m.y)
            }
            None => {
                println!("not found");
                false
            }
        },
        Commands::Template(args) => {
            let found = match args.near.as_deref() {
                Some(&[x, y]) => service.match_template_near(&args.name, (x, y), args.radius, args.threshold),
                _ => service.match_template(&args.name, args.threshold),
            };
            match found {
                Some(m) => {
                    println!("{}\t{}\t{:.3}", m.x, m.y, m.score);
                    !args.click || service.click_at(m.x, m.y)
                }
                None => {
                    println!("not found");
                    false
                }
            }
        }
        Commands::Watch { seconds } => {
            watch(&service, Duration::from_secs(seconds));
            true
        }
        Commands::Paste | Commands::Title { .. } => true,
    };

    service.stop();
    Ok(ok)
}

fn watch(service: &ScreenMonitorService, duration: Duration) {
    use std::sync::atomic::Ordering;

    let started = Instant::now();
    while started.elapsed() < duration {
        std::thread::sleep(Duration::from_secs(1));
        let stats = service.source().stats();
        tracing::info!(
            state = ?service.state(),
            frames = stats.frames.load(Ordering::Relaxed),
            failures = stats.failures.load(Ordering::Relaxed),
            "capture status"
        );
    }
}
