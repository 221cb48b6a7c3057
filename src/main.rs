use clap::{Parser, Subcommand};
use meridian_geo::config::EngineConfig;
use meridian_geo::integration::CoordinateIntegrationService;
use meridian_geo::location::{Coordinates, PrecisionLevel};
use meridian_geo::registry::store;
use serde::Serialize;
use std::path::PathBuf;

/// Meridian: coordinate resolution engine.
///
/// Resolves free-text destinations to checked coordinates through a verified
/// registry, a tiered geocoder and a built-in table of well-known places.
///
/// Examples:
///   meridian resolve "Eiffel Tower"
///   meridian resolve Paris Tokyo "Golden Gate Bridge"
///   meridian reverse --lat 41.8902 --lng 12.4922
///   meridian check --lat 48.8566 --lng 2.3522 --precision building
///   meridian serve --port 8080
#[derive(Parser)]
#[command(name = "meridian", version, about, long_about = None)]
struct Cli {
    /// Config file. Defaults to ~/.meridian/config.json.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Offline mode: only the registry, the cache and built-in data.
    #[arg(long, global = true)]
    offline: bool,

    /// Registry snapshot to load at startup and save afterwards.
    #[arg(long, global = true)]
    registry: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate one or more destinations.
    Resolve {
        #[arg(required = true)]
        destinations: Vec<String>,
    },
    /// Reverse geocode a coordinate pair.
    Reverse {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lng: f64,
    },
    /// Run the coordinate validator offline.
    Check {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lng: f64,
        /// city, building or room.
        #[arg(long)]
        precision: Option<PrecisionLevel>,
    },
    /// Start the HTTP server.
    Serve {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("meridian_geo=info,meridian=info")),
        )
        .init();
}

fn fail(msg: impl std::fmt::Display) -> ! {
    eprintln!("Error: {}", msg);
    std::process::exit(1);
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => fail(e),
    }
}

fn load_config(cli: &Cli) -> EngineConfig {
    let loaded = match &cli.config {
        Some(path) => EngineConfig::load_from(path).map(|mut c| {
            c.apply_api_key(std::env::var(meridian_geo::config::API_KEY_ENV).ok());
            c
        }),
        None => EngineConfig::load(),
    };
    let mut config = loaded.unwrap_or_else(|e| fail(e));
    if cli.offline {
        config.offline = true;
    }
    if let Some(path) = &cli.registry {
        config.registry_path = Some(path.clone());
    }
    config
}

fn save_registry(service: &CoordinateIntegrationService, config: &EngineConfig) {
    if let Some(path) = &config.registry_path {
        if let Err(e) = store::save_to(path, &service.registry().snapshot()) {
            eprintln!("Warning: could not save registry to {}: {}", path.display(), e);
        }
    }
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();
    let config = load_config(&cli);

    match &cli.command {
        Command::Check { lat, lng, precision } => {
            let validator = meridian_geo::location::CoordinateValidator::new();
            let coords = Coordinates::new(*lat, *lng);
            let result = validator.validate(&coords);
            eprintln!(
                "  {} -> {}",
                coords,
                if result.valid { "valid" } else { "invalid" }
            );
            for w in &result.warnings {
                eprintln!("  warning: {}", w);
            }
            print_json(&serde_json::json!({
                "coordinates": coords,
                "normalized": validator.normalize(&coords),
                "result": result,
                "precision": precision.map(|p| validator.validate_precision(&coords, p)),
            }));
        }
        Command::Resolve { destinations } => {
            let service = config.build_service().unwrap_or_else(|e| fail(e));
            let results = if destinations.len() == 1 {
                vec![service.validate_destination(&destinations[0]).await]
            } else {
                service.validate_destinations(destinations).await
            };
            for r in &results {
                let mark = if r.is_valid { "ok" } else { "--" };
                eprintln!("  [{}] {} -> {} ({}, {})", mark, r.query, r.coordinates, r.source, r.accuracy);
                for w in &r.warnings {
                    eprintln!("       warning: {}", w);
                }
            }
            save_registry(&service, &config);
            if results.len() == 1 {
                print_json(&results[0]);
            } else {
                print_json(&results);
            }
            if results.iter().all(|r| !r.is_valid) {
                std::process::exit(2);
            }
        }
        Command::Reverse { lat, lng } => {
            let service = config.build_service().unwrap_or_else(|e| fail(e));
            match service.geocoder().reverse_geocode(Coordinates::new(*lat, *lng)).await {
                Ok(r) => {
                    eprintln!("  {} -> {} ({})", r.coordinates, r.formatted_address, r.source);
                    print_json(&r);
                }
                Err(e) => fail(e),
            }
        }
        Command::Serve { host, port } => {
            let service = config.build_service().unwrap_or_else(|e| fail(e));
            eprintln!("  Meridian server on http://{}:{}  (Ctrl+C to stop)", host, port);
            if let Err(e) = meridian_geo::server::start(service, config.registry_path.clone(), host, *port).await {
                fail(e);
            }
        }
    }
}
