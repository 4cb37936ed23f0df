use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use reel_locator::caption::{RawCaption, StaticCaptionSource};
use reel_locator::config::Config;
use reel_locator::location::{LocateError, ResolutionOrchestrator};
use reel_locator::server::{self, AppState, LocationResponse};

/// Reel Locator: find where a post was filmed.
///
/// Reads the post caption, picks out the location it announces and resolves
/// it to coordinates and a Google Maps link.
///
/// Examples:
///   reel-locator https://www.instagram.com/reel/C8abc12/
///   reel-locator --caption-file caption.txt
///   reel-locator --caption-file caption.txt --parse-only
///   reel-locator --serve --port 5000
#[derive(Parser)]
#[command(name = "reel-locator", version, about, long_about = None)]
struct Cli {
    /// Post URL, or a SerpApi place link.
    #[arg(index = 1)]
    reference: Option<String>,

    /// Read the caption from a local file instead of fetching it.
    #[arg(long)]
    caption_file: Option<PathBuf>,

    /// Print the parsed location block and query; call no provider.
    #[arg(long)]
    parse_only: bool,

    /// Start the HTTP server.
    #[arg(long)]
    serve: bool,

    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    #[arg(long, default_value_t = 5000)]
    port: u16,

    /// JSON config file. Defaults to <config dir>/reel-locator/config.json.
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    home_city: Option<String>,

    #[arg(long)]
    home_state: Option<String>,

    #[arg(long)]
    home_postal_code: Option<String>,

    /// Per-call timeout for every external request, in seconds.
    #[arg(long)]
    timeout_secs: Option<u64>,
}

impl Cli {
    fn apply_overrides(&self, config: &mut Config) {
        if let Some(ref city) = self.home_city {
            config.home_region.city = city.clone();
        }
        if let Some(ref state) = self.home_state {
            config.home_region.state = state.clone();
        }
        if let Some(ref code) = self.home_postal_code {
            config.home_region.postal_code = code.clone();
        }
        if let Some(secs) = self.timeout_secs {
            config.per_call_timeout_secs = secs;
        }
    }
}

fn main() {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref()).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    });
    cli.apply_overrides(&mut config);

    // ── Server mode ─────────────────────────────────────────────

    if cli.serve {
        let state = AppState::from_config(&config);
        let runtime = tokio::runtime::Runtime::new().unwrap_or_else(|e| {
            eprintln!("Error: cannot start runtime: {}", e);
            std::process::exit(1);
        });
        if let Err(e) = runtime.block_on(server::start(&cli.host, cli.port, state)) {
            eprintln!("Server error: {}", e);
            std::process::exit(1);
        }
        return;
    }

    let caption = cli.caption_file.as_ref().map(|path| {
        std::fs::read_to_string(path).unwrap_or_else(|e| {
            eprintln!("Error: cannot read {}: {}", path.display(), e);
            std::process::exit(1);
        })
    });

    let mut orchestrator = ResolutionOrchestrator::from_config(&config);

    // ── Parse only ──────────────────────────────────────────────

    if cli.parse_only {
        let Some(text) = caption else {
            eprintln!("Error: --parse-only needs --caption-file");
            std::process::exit(1);
        };
        match orchestrator.analyze_caption(&RawCaption::new(text)) {
            Some(analysis) => print_json(&analysis),
            None => {
                print_json(&LocationResponse::failed(&LocateError::NoLocationFound));
                std::process::exit(1);
            }
        }
        return;
    }

    // ── Resolve ─────────────────────────────────────────────────

    let outcome = match (caption, cli.reference.as_deref()) {
        (Some(text), reference) => {
            // a local caption stands in for the post; a place link still wins
            orchestrator = orchestrator.with_captions(Box::new(StaticCaptionSource::new(text.clone())));
            match reference {
                Some(r) => orchestrator.locate(r),
                None => orchestrator.locate_caption(&RawCaption::new(text)),
            }
        }
        (None, Some(reference)) => orchestrator.locate(reference),
        (None, None) => {
            eprintln!("Error: No post URL specified.");
            eprintln!();
            eprintln!("Usage:");
            eprintln!("  reel-locator https://www.instagram.com/reel/<code>/");
            eprintln!("  reel-locator --caption-file caption.txt");
            eprintln!("  reel-locator --serve");
            std::process::exit(1);
        }
    };

    let response = match outcome {
        Ok(place) => LocationResponse::found(&place),
        Err(e) => LocationResponse::failed(&e),
    };
    print_json(&response);
    if !response.status().is_success() {
        std::process::exit(1);
    }
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Error: cannot serialize output: {}", e);
            std::process::exit(1);
        }
    }
}
