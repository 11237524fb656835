use clap::Parser;
use rand::Rng;
use shared::{Event, Packet, SubmissionAttempt, MAX_PACKET_SIZE};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::timeout;

#[derive(Parser, Debug)]
#[command(author, version, about = "Sends sample runs to a score server", long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Display name to submit under
    #[arg(short = 'n', long, default_value = "tester")]
    name: String,

    /// Number of runs to submit
    #[arg(short = 'r', long, default_value = "3")]
    runs: u32,

    /// Also submit one run the server should reject
    #[arg(long)]
    cheat: bool,
}

/// Builds a run of `run_ms` with human-paced moves and a score inside the model
fn generate_run(rng: &mut impl Rng, name: &str, run_ms: f64) -> SubmissionAttempt {
    let mut events = Vec::new();
    let mut t = 0.0;

    while t < run_ms {
        let kind = if rng.gen_bool(0.8) { "move" } else { "jump" };
        events.push(Event::new(t, kind));
        t += rng.gen_range(150.0..600.0);
        if events.len() >= 2000 {
            break;
        }
    }

    let max_possible = (run_ms / 200.0).ceil() * 5.0;
    let score = rng.gen_range(0.0..max_possible).floor();

    SubmissionAttempt::new(name, score, run_ms, events)
}

/// A run claiming far more than the time allows
fn generate_cheat(name: &str) -> SubmissionAttempt {
    SubmissionAttempt::new(name, 1_000_000.0, 2_000.0, vec![Event::movement(0.0)])
}

async fn request(
    socket: &UdpSocket,
    server_addr: SocketAddr,
    packet: &Packet,
) -> Result<Packet, Box<dyn std::error::Error>> {
    socket.send_to(&packet.encode()?, server_addr).await?;

    let mut buf = vec![0u8; MAX_PACKET_SIZE];
    let (len, _) = timeout(Duration::from_secs(2), socket.recv_from(&mut buf)).await??;
    Ok(Packet::decode(&buf[..len])?)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    // Create local socket
    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    println!("Client socket bound to {}", socket.local_addr()?);

    let server_addr = args.server.parse::<SocketAddr>()?;

    match request(&socket, server_addr, &Packet::Ping).await? {
        Packet::Pong => println!("Server at {} is alive", server_addr),
        other => println!("Unexpected reply to ping: {:?}", other),
    }

    let mut rng = rand::thread_rng();
    let mut attempts: Vec<SubmissionAttempt> = (0..args.runs)
        .map(|_| {
            let run_ms = rng.gen_range(5_000.0..120_000.0);
            generate_run(&mut rng, &args.name, run_ms)
        })
        .collect();
    if args.cheat {
        attempts.push(generate_cheat(&args.name));
    }

    for attempt in attempts {
        println!(
            "Submitting score {:?} over {:?}ms with {} events",
            attempt.claimed_score,
            attempt.run_ms,
            attempt.events_count()
        );

        match request(&socket, server_addr, &Packet::Submit(attempt)).await? {
            Packet::Accepted { id } => println!("  accepted as record {}", id),
            Packet::Rejected {
                reason,
                detail,
                diagnostics,
                retryable,
            } => {
                println!(
                    "  rejected: {} {} (retryable: {})",
                    reason,
                    detail.unwrap_or_default(),
                    retryable
                );
                if let Some(d) = diagnostics {
                    println!(
                        "  model: {:.2} moves/s, {} entities, max score {}",
                        d.moves_per_second, d.max_entities, d.max_possible_score
                    );
                }
            }
            other => println!("  unexpected reply: {:?}", other),
        }
    }

    match request(&socket, server_addr, &Packet::ListTop { limit: Some(10) }).await? {
        Packet::Leaderboard { entries } => {
            println!("Leaderboard:");
            for (rank, entry) in entries.iter().enumerate() {
                println!(
                    "  {:>2}. {:<20} {:>8} ({}ms)",
                    rank + 1,
                    entry.name,
                    entry.score,
                    entry.run_ms
                );
            }
        }
        other => println!("Unexpected reply to leaderboard query: {:?}", other),
    }

    println!("Test client finished");
    Ok(())
}
