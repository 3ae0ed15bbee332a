// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Command line utility for terminal file transfer and remote key injection

use std::{net::SocketAddr, time::Duration};

use clap::Parser;
use log::{debug, error, info, warn, LevelFilter};

use rki::{
    apdu::Interface,
    host::{HostConfig, KeyHostClient},
    inject::{self, PromptPolicy, RkiConfig, RkiEvent},
    transport::TcpTransport,
    DeviceHandle, TransferOptions, UploadSource,
};

mod helpers;
use helpers::*;

/// Terminal RKI command line utility
#[derive(Clone, PartialEq, Debug, Parser)]
struct Options {
    /// Terminal (or terminal bridge) address
    #[clap(long, env = "RKI_DEVICE", default_value = "127.0.0.1:9100")]
    device: SocketAddr,

    /// Terminal command interface
    #[clap(long, value_enum, default_value = "primary")]
    interface: InterfaceArg,

    /// Command response timeout in milliseconds
    #[clap(long, default_value = "5000")]
    timeout_ms: u64,

    /// Subcommand to execute
    #[clap(subcommand)]
    cmd: Actions,

    /// Enable verbose logging
    #[clap(long, default_value = "info")]
    log_level: LevelFilter,
}

#[derive(Clone, PartialEq, Debug, Parser)]
#[non_exhaustive]
enum Actions {
    /// Fetch terminal secure storage state
    SecureState,

    /// Show a prompt on the terminal display
    Display {
        /// Text to display
        text: String,
    },

    /// Download a terminal-resident file
    Download {
        /// Terminal file name
        file: String,

        /// Output file, file content is printed where not provided
        #[clap(long)]
        output: Option<String>,

        /// Maximum bytes per read
        #[clap(long, default_value_t = rki::file::DEFAULT_READ_CHUNK)]
        chunk: usize,
    },

    /// Upload a local file to the terminal
    Upload {
        /// Terminal file name
        file: String,

        /// Local input file
        #[clap(long)]
        input: String,

        /// Maximum bytes per write
        #[clap(long, default_value_t = rki::file::DEFAULT_WRITE_CHUNK)]
        chunk: usize,

        /// Pacing hint passed with each write, in milliseconds
        #[clap(long, default_value = "0")]
        delay_ms: u16,
    },

    /// Run remote key injection using the provided key host
    Inject {
        /// Key host provisioning endpoint
        #[clap(long, env = "RKI_HOST_URL")]
        host_url: String,

        /// Key host connect timeout in seconds
        #[clap(long, default_value = "15")]
        connect_timeout_s: u64,

        /// Key host request timeout in seconds
        #[clap(long, default_value = "30")]
        request_timeout_s: u64,

        /// Continue where operator prompts fail to display
        #[clap(long)]
        best_effort_prompts: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let args = Options::parse();

    // Setup logging
    let _ = simplelog::SimpleLogger::init(args.log_level, simplelog::Config::default());

    // Connect to terminal
    let t = match TcpTransport::connect(args.device).await {
        Ok(v) => v,
        Err(e) => {
            error!("Failed to connect to terminal at {}", args.device);
            return Err(e.into());
        }
    };

    let d = DeviceHandle::from(t).with_request_timeout(Duration::from_millis(args.timeout_ms));

    // Execute command
    execute(d, args.interface.into(), args.cmd).await?;

    Ok(())
}

/// Execute a command with the provided terminal handle
async fn execute(
    d: DeviceHandle<TcpTransport>,
    interface: Interface,
    cmd: Actions,
) -> anyhow::Result<()> {
    debug!("Executing command: {:?}", cmd);

    match cmd {
        Actions::SecureState => {
            let s = d.secure_state(interface).await?;

            info!("initialised: {}", s.initialised);
            info!("pin key ready: {}", s.pin_key_ready);
            info!("sred key ready: {}", s.sred_key_ready);
        }
        Actions::Display { text } => {
            d.display(interface, &text).await?;
        }
        Actions::Download {
            file,
            output,
            chunk,
        } => {
            info!("Downloading '{}'", file);

            let opts = TransferOptions::download().with_chunk(chunk);
            let data = d
                .download(interface, &file, &opts, |p| {
                    info!("{}: {:.0}%", file, p * 100.0)
                })
                .await?;

            write_output(output.as_deref(), &data).await?;
        }
        Actions::Upload {
            file,
            input,
            chunk,
            delay_ms,
        } => {
            debug!("Reading input from '{}'", input);
            let f = tokio::fs::File::open(&input).await?;

            let opts = TransferOptions::upload()
                .with_chunk(chunk)
                .with_delay_ms(delay_ms);

            let n = d
                .upload(
                    interface,
                    &file,
                    UploadSource::from_reader(f),
                    &opts,
                    |n| info!("{}: {} bytes", file, n),
                )
                .await?;

            info!("Uploaded {} bytes to '{}'", n, file);
        }
        Actions::Inject {
            host_url,
            connect_timeout_s,
            request_timeout_s,
            best_effort_prompts,
        } => {
            let host = KeyHostClient::http(&HostConfig {
                url: host_url,
                connect_timeout: Duration::from_secs(connect_timeout_s),
                request_timeout: Duration::from_secs(request_timeout_s),
            })?;

            let cfg = RkiConfig {
                interface,
                prompts: match best_effort_prompts {
                    true => PromptPolicy::BestEffort,
                    false => PromptPolicy::Strict,
                },
                ..Default::default()
            };

            info!("Starting key injection via {}", host.url());

            let (h, mut events) = inject::spawn(d, host, cfg);

            // Report events until the run completes and the sender is dropped
            while let Some(e) = events.recv().await {
                match e {
                    RkiEvent::State(s) => info!("state: {}", s),
                    RkiEvent::Download { file, progress } => {
                        debug!("{}: {:.0}%", file, progress * 100.0)
                    }
                    RkiEvent::Upload { file, sent } => debug!("{}: {} bytes", file, sent),
                    RkiEvent::DisplayWarning(w) => warn!("display: {}", w),
                }
            }

            match h.await? {
                Ok(r) => {
                    info!("Key injection complete: {:?}", r.state);
                    if let Some(w) = r.display_warning {
                        warn!("Confirmation prompt failed: {}", w);
                    }
                }
                Err(e) => {
                    error!("Key injection failed ({}): {}", e.kind(), e);
                    return Err(e.into());
                }
            }
        }
    }

    Ok(())
}
