// Copyright (c) 2022-2023 The MobileCoin Foundation

use std::net::SocketAddr;

use clap::Parser;
use log::{debug, info, LevelFilter};
use tokio::net::TcpListener;

use rki::inject::BOOTSTRAP_FILES;
use rki_apdu::prelude::SecureFlags;
use rki_sim::*;

/// Payment terminal simulator
///
/// Serves an in-memory terminal over TCP, seeded with placeholder
/// bootstrap files for exercising file transfer and key injection.
#[derive(Clone, Debug, PartialEq, Parser)]
pub struct Args {
    /// Listen address
    #[clap(long, env = "RKI_DEVICE", default_value = "127.0.0.1:9100")]
    listen: SocketAddr,

    /// Skip seeding bootstrap files
    #[clap(long)]
    empty: bool,

    /// Start with keys already provisioned
    #[clap(long)]
    provisioned: bool,

    /// Log level
    #[clap(long, default_value = "debug")]
    log_level: LevelFilter,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Setup logging
    let _ = simplelog::SimpleLogger::init(args.log_level, simplelog::Config::default());

    // Seed terminal state
    let sim = Sim::new();
    if !args.empty {
        for f in BOOTSTRAP_FILES {
            sim.put_file(f, format!("simulated {f}\n").as_bytes());
        }
    }
    if args.provisioned {
        sim.set_flags(SecureFlags::PIN_KEY_READY | SecureFlags::SRED_KEY_READY);
    }

    let listener = TcpListener::bind(args.listen).await?;

    info!("Launching terminal simulator...");

    // Await server exit or exit signal
    tokio::select!(
        r = serve(listener, sim) => {
            debug!("Complete!");
            r?;
        }
        // Exit on ctrl + c
        _ = tokio::signal::ctrl_c() => {
            debug!("Exit!");
        },
    );

    Ok(())
}
