// Copyright (c) 2022-2023 The MobileCoin Foundation

use std::path::Path;

use log::{debug, info};

use rki::apdu::Interface;

/// Terminal command interface selection
#[derive(Copy, Clone, PartialEq, Debug, clap::ValueEnum)]
pub enum InterfaceArg {
    Primary,
    Secondary,
}

impl From<InterfaceArg> for Interface {
    fn from(i: InterfaceArg) -> Self {
        match i {
            InterfaceArg::Primary => Interface::Primary,
            InterfaceArg::Secondary => Interface::Secondary,
        }
    }
}

/// Helper to write downloaded data to the provided file, or print where no file is provided
pub async fn write_output(file_name: Option<&str>, data: &[u8]) -> anyhow::Result<()> {
    let file_name = match file_name {
        Some(v) => v,
        None => {
            // Print text content directly, binary as hex
            match std::str::from_utf8(data) {
                Ok(s) => info!("content:\r\n{}", s),
                Err(_) => info!("content (hex): {}", hex::encode(data)),
            }
            return Ok(());
        }
    };

    debug!("Writing output to '{}'", file_name);

    tokio::fs::write(Path::new(file_name), data).await?;

    Ok(())
}
