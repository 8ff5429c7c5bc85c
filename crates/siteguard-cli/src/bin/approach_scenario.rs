//! CLI tool to simulate a machine passing a worker on a SiteGuard server.
//!
//! Registers both entities, streams their positions and prints the alert
//! flags the server publishes as the machine approaches and drives away.

use clap::Parser;
use siteguard_cli::sim::create_approach_scenario;
use siteguard_cli::SiteClient;
use siteguard_core::Provider;
use std::time::Duration;
use tokio::time;

/// Simulate a machine driving past a standing worker
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// SiteGuard server URL
    #[arg(long, default_value = "http://localhost:3000")]
    url: String,

    #[arg(long, default_value = "demo-site")]
    worksite: String,

    /// Worker latitude
    #[arg(long, default_value_t = 33.6846, allow_hyphen_values = true)]
    lat: f64,

    /// Worker longitude
    #[arg(long, default_value_t = -117.8265, allow_hyphen_values = true)]
    lon: f64,

    /// Machine start/end distance from the worker, in degrees
    #[arg(long, default_value_t = 0.001)]
    offset: f64,

    /// Seconds for the machine to cross
    #[arg(long, default_value_t = 20.0)]
    travel: f64,

    /// Update rate in Hz
    #[arg(long, default_value_t = 1.0)]
    rate: f64,

    /// Collision threshold to set before starting, in degrees
    #[arg(long)]
    threshold: Option<f64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    if !(args.rate.is_finite() && args.rate > 0.0) {
        anyhow::bail!("--rate must be positive");
    }

    println!("Connecting to SiteGuard server at {}...", args.url);
    let client = SiteClient::new(&args.url);

    let scenario =
        create_approach_scenario(&args.worksite, args.lat, args.lon, args.offset, args.travel);
    client.put_worksite(&scenario.worksite).await?;
    for (id, kind, _) in &scenario.entities {
        client.register_entity(id, *kind, &args.worksite).await?;
        println!("Registered {:?} {}", kind, id);
    }
    if let Some(threshold) = args.threshold {
        client.set_threshold(threshold).await?;
        println!("Collision threshold set to {}", threshold);
    }

    println!("Starting {} scenario on {}", scenario.name, args.worksite);
    println!("  Worker: ({}, {})", args.lat, args.lon);
    println!("  Pass offset: {} deg, travel: {}s", args.offset, args.travel);
    println!();

    // Run a little past the crossing so the clear is observed too.
    let duration = scenario.duration_s() + 3.0;
    let start = time::Instant::now();
    let mut interval = time::interval(Duration::from_secs_f64(1.0 / args.rate));
    let mut update_count = 0u32;

    loop {
        interval.tick().await;

        let elapsed = start.elapsed().as_secs_f64();
        if elapsed > duration {
            break;
        }

        for (id, _, path) in &scenario.entities {
            let point = path.position(elapsed);
            match client.post_fix(id, point, 5.0, Provider::Gps).await {
                Ok(()) => update_count += 1,
                Err(e) => eprintln!("Error sending fix for {}: {}", id, e),
            }
        }

        match client.alerts().await {
            Ok(alerts) => {
                let active: Vec<&str> = alerts
                    .iter()
                    .filter(|a| a.active)
                    .map(|a| a.entity_id.as_str())
                    .collect();
                println!("[{:5.1}s] alerting: {:?}", elapsed, active);
            }
            Err(e) => eprintln!("Error reading alerts: {}", e),
        }
    }

    println!("\nScenario complete. Sent {} position updates.", update_count);
    Ok(())
}
