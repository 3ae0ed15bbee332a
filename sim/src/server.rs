// Copyright (c) 2022-2023 The MobileCoin Foundation

//! TCP server exposing a [Sim] terminal using the framed command protocol

use log::{debug, info, warn};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
};

use rki::transport::Command;
use rki_apdu::frame::{RequestHeader, ResponseHeader};

use crate::Sim;

/// Serve the provided terminal on a bound listener, one task per connection.
///
/// Runs until the listener fails or the returned future is dropped.
pub async fn serve(listener: TcpListener, sim: Sim) -> anyhow::Result<()> {
    info!("Serving terminal on {}", listener.local_addr()?);

    loop {
        let (stream, peer) = listener.accept().await?;
        debug!("Accepted connection from {}", peer);

        let sim = sim.clone();
        tokio::spawn(async move {
            match handle_conn(stream, sim).await {
                Ok(()) => debug!("Connection from {} closed", peer),
                Err(e) => warn!("Connection from {} failed: {}", peer, e),
            }
        });
    }
}

async fn handle_conn(mut stream: TcpStream, sim: Sim) -> anyhow::Result<()> {
    stream.set_nodelay(true)?;

    loop {
        let mut h = [0u8; RequestHeader::LEN];
        match stream.read_exact(&mut h).await {
            Ok(_) => (),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(()),
            Err(e) => return Err(e.into()),
        }

        let header = RequestHeader::decode(&h)
            .map_err(|e| anyhow::anyhow!("invalid request header: {}", e))?;

        let mut data = vec![0u8; header.len as usize];
        stream.read_exact(&mut data).await?;

        let cmd = Command {
            header: header.apdu,
            data,
        };

        let r = match sim.handle(header.interface, &cmd) {
            Some(r) => r,
            None => continue,
        };

        let mut buff = vec![0u8; ResponseHeader::LEN + r.body.len()];
        ResponseHeader {
            status: r.status,
            len: r.body.len() as u32,
        }
        .encode(&mut buff)
        .map_err(|e| anyhow::anyhow!("response encoding failed: {}", e))?;
        buff[ResponseHeader::LEN..].copy_from_slice(&r.body);

        stream.write_all(&buff).await?;
    }
}
