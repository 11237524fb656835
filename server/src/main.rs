use clap::Parser;
use log::{error, info};
use server::admission::AdmissionConfig;
use server::leaderboard::MemoryStore;
use server::name::NameValidator;
use server::network::Server;
use server::plausibility::PlausibilityConfig;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Seconds between sweeps of stale rate limiter entries
    #[arg(long, default_value = "30", value_parser = clap::value_parser!(u64).range(1..))]
    sweep_interval_secs: u64,

    /// Length of the rate limiting window in milliseconds
    #[arg(long, default_value = "60000")]
    rate_window_ms: u64,

    /// Submission attempts allowed per client inside one window
    #[arg(long, default_value = "6")]
    rate_max_attempts: usize,

    /// Shortest display name after trimming
    #[arg(long, default_value = "2")]
    min_name_len: usize,

    /// Longest display name after trimming
    #[arg(long, default_value = "20")]
    max_name_len: usize,

    /// Shortest accepted run in milliseconds
    #[arg(long, default_value = "500", value_parser = non_negative)]
    min_run_ms: f64,

    /// Longest accepted run in milliseconds
    #[arg(long, default_value = "3600000", value_parser = non_negative)]
    max_run_ms: f64,

    /// Longest accepted event trace
    #[arg(long, default_value = "2000")]
    max_events: usize,

    /// Highest accepted rate of move events per second
    #[arg(long, default_value = "12", value_parser = non_negative)]
    max_moves_per_second: f64,

    /// Floor for the run length used to compute move rates, in seconds
    #[arg(long, default_value = "0.001", value_parser = positive)]
    min_elapsed_secs: f64,

    /// Milliseconds per scorable entity in the capacity model
    #[arg(long, default_value = "200", value_parser = positive)]
    ms_per_entity: f64,

    /// Points per entity in the capacity model
    #[arg(long, default_value = "5", value_parser = non_negative)]
    points_per_entity: f64,

    /// Multiplier on the modelled maximum score before rejecting
    #[arg(long, default_value = "2", value_parser = non_negative)]
    score_slack_factor: f64,

    /// Event type counted as a move
    #[arg(long, default_value = shared::MOVE_EVENT)]
    move_event_type: String,
}

fn finite(value: &str) -> Result<f64, String> {
    let parsed: f64 = value
        .parse()
        .map_err(|e| format!("`{}` is not a number: {}", value, e))?;
    if !parsed.is_finite() {
        return Err(format!("`{}` is not a finite number", value));
    }
    Ok(parsed)
}

fn non_negative(value: &str) -> Result<f64, String> {
    let parsed = finite(value)?;
    if parsed < 0.0 {
        return Err(format!("`{}` must not be negative", value));
    }
    Ok(parsed)
}

// Values used as divisors
fn positive(value: &str) -> Result<f64, String> {
    let parsed = finite(value)?;
    if parsed <= 0.0 {
        return Err(format!("`{}` must be greater than zero", value));
    }
    Ok(parsed)
}

impl Args {
    fn admission_config(&self) -> AdmissionConfig {
        AdmissionConfig {
            rate_window_ms: self.rate_window_ms,
            rate_max_attempts: self.rate_max_attempts,
            names: NameValidator::new(self.min_name_len, self.max_name_len),
            plausibility: PlausibilityConfig {
                min_run_ms: self.min_run_ms,
                max_run_ms: self.max_run_ms,
                max_events: self.max_events,
                max_moves_per_second: self.max_moves_per_second,
                min_elapsed_secs: self.min_elapsed_secs,
                ms_per_entity: self.ms_per_entity,
                points_per_entity: self.points_per_entity,
                score_slack_factor: self.score_slack_factor,
                move_event_type: self.move_event_type.clone(),
            },
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let config = args.admission_config();

    info!("Starting score server...");
    info!(
        "Rate limit: {} attempts per {}ms, names {}-{} chars",
        config.rate_max_attempts, config.rate_window_ms, config.names.min_len, config.names.max_len
    );
    info!("Plausibility model: {:?}", config.plausibility);

    let address = format!("{}:{}", args.host, args.port);
    let mut server = Server::new(
        &address,
        config,
        MemoryStore::new(),
        Duration::from_secs(args.sweep_interval_secs),
    )
    .await?;

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Server stopped with error: {}", e);
                return Err(e.into());
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
        }
    }

    Ok(())
}
