//! CLI tool to push one position fix into a SiteGuard server.

use clap::{Parser, ValueEnum};
use siteguard_cli::SiteClient;
use siteguard_core::{GeoPoint, Provider};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ProviderArg {
    Gps,
    Network,
    Fused,
    Remote,
}

impl From<ProviderArg> for Provider {
    fn from(arg: ProviderArg) -> Self {
        match arg {
            ProviderArg::Gps => Provider::Gps,
            ProviderArg::Network => Provider::Network,
            ProviderArg::Fused => Provider::Fused,
            ProviderArg::Remote => Provider::Remote,
        }
    }
}

/// Send a single position fix for a registered worker or machine
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// SiteGuard server URL
    #[arg(long, default_value = "http://localhost:3000")]
    url: String,

    /// Entity identifier
    #[arg(long)]
    entity: String,

    /// Position as "<lat>,<lon>"
    #[arg(long, allow_hyphen_values = true)]
    gps: String,

    /// Estimated error radius in meters
    #[arg(long, default_value_t = 5.0)]
    accuracy: f64,

    #[arg(long, value_enum, default_value = "gps")]
    provider: ProviderArg,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let point = GeoPoint::parse(&args.gps)?;
    let client = SiteClient::new(&args.url);

    client
        .post_fix(&args.entity, point, args.accuracy, args.provider.into())
        .await?;
    println!("Sent {} for {} -> accepted", point, args.entity);

    for alert in client.alerts().await? {
        if alert.entity_id == args.entity {
            println!("Alert for {}: {}", alert.entity_id, if alert.active { "on" } else { "off" });
        }
    }
    Ok(())
}
