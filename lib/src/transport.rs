// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Command channel abstraction and transports

use std::time::Duration;

use async_trait::async_trait;
use encdec::Encode;
use log::{debug, trace};

use rki_apdu::{ApduHeader, ApduReq, Interface, StatusCode};

#[cfg(feature = "transport_tcp")]
pub use tcp::TcpTransport;

use crate::Error;

/// Encoded command, ready for transmission
#[derive(Clone, Debug, PartialEq)]
pub struct Command {
    pub header: ApduHeader,
    pub data: Vec<u8>,
}

impl Command {
    /// Encode an APDU request into a [Command]
    pub fn encode(req: &impl ApduReq) -> Result<Self, Error> {
        let mut data = vec![0u8; req.encode_len()?];
        let n = req.encode(&mut data)?;
        data.truncate(n);

        Ok(Self {
            header: req.header(),
            data,
        })
    }
}

/// Result of a single command exchange
#[derive(Clone, Debug, PartialEq)]
pub struct CommandResult {
    /// Response status word
    pub status: StatusCode,
    /// Response body
    pub body: Vec<u8>,
}

impl CommandResult {
    pub fn new(status: StatusCode, body: Vec<u8>) -> Self {
        Self { status, body }
    }

    /// Check whether the response status indicates success
    pub fn status_ok(&self) -> bool {
        self.status.is_ok()
    }
}

/// Command / response channel to a terminal.
///
/// Channels support one in-flight command per interface, callers must
/// [Channel::receive] the response to each [Channel::send] before issuing
/// another command.
#[async_trait]
pub trait Channel: Send {
    /// Send a command on the provided interface
    async fn send(&mut self, interface: Interface, cmd: &Command) -> Result<(), Error>;

    /// Receive the response to the last command, returning `None` on timeout
    async fn receive(
        &mut self,
        interface: Interface,
        timeout: Duration,
    ) -> Result<Option<CommandResult>, Error>;
}

/// Helper to exchange a single command, mapping receive timeouts to [Error::RequestTimeout]
pub(crate) async fn exchange<T: Channel + ?Sized>(
    t: &mut T,
    interface: Interface,
    cmd: &Command,
    timeout: Duration,
) -> Result<CommandResult, Error> {
    trace!(
        "TX {} ins: 0x{:02x} p1: 0x{:02x} ({} bytes)",
        interface,
        cmd.header.ins,
        cmd.header.p1,
        cmd.data.len()
    );

    t.send(interface, cmd).await?;

    match t.receive(interface, timeout).await? {
        Some(r) => {
            trace!("RX {} status: {} ({} bytes)", interface, r.status, r.body.len());
            Ok(r)
        }
        None => {
            debug!("No response to ins 0x{:02x} within {:?}", cmd.header.ins, timeout);
            Err(Error::RequestTimeout)
        }
    }
}

#[cfg(feature = "transport_tcp")]
mod tcp {
    use std::{net::SocketAddr, time::Duration};

    use async_trait::async_trait;
    use log::{debug, warn};
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpStream,
    };

    use rki_apdu::{
        frame::{RequestHeader, ResponseHeader, MAX_FRAME_PAYLOAD},
        ApduError, Interface,
    };

    use super::{Channel, Command, CommandResult};
    use crate::Error;

    /// TCP transport, exchanging framed commands with a terminal (or terminal bridge)
    pub struct TcpTransport {
        stream: Option<TcpStream>,
        pending: Option<Interface>,
    }

    impl TcpTransport {
        /// Connect to a terminal at the provided address
        pub async fn connect(addr: SocketAddr) -> Result<Self, Error> {
            debug!("Connecting to {}", addr);

            let stream = TcpStream::connect(addr).await?;
            stream.set_nodelay(true)?;

            Ok(Self {
                stream: Some(stream),
                pending: None,
            })
        }

        /// Close the connection, subsequent commands fail with [Error::Disconnected]
        pub async fn close(&mut self) -> Result<(), Error> {
            if let Some(mut s) = self.stream.take() {
                s.shutdown().await?;
            }
            Ok(())
        }

        async fn read_response(stream: &mut TcpStream) -> Result<CommandResult, Error> {
            let mut h = [0u8; ResponseHeader::LEN];
            stream.read_exact(&mut h).await.map_err(map_eof)?;

            let header = ResponseHeader::decode(&h).map_err(Error::Frame)?;

            let mut body = vec![0u8; header.len as usize];
            stream.read_exact(&mut body).await.map_err(map_eof)?;

            Ok(CommandResult::new(header.status, body))
        }
    }

    fn map_eof(e: std::io::Error) -> Error {
        match e.kind() {
            std::io::ErrorKind::UnexpectedEof => Error::Disconnected,
            _ => Error::Io(e),
        }
    }

    #[async_trait]
    impl Channel for TcpTransport {
        async fn send(&mut self, interface: Interface, cmd: &Command) -> Result<(), Error> {
            // Oversized frames are rejected by the terminal, which drops the connection
            if cmd.data.len() > MAX_FRAME_PAYLOAD {
                return Err(Error::Frame(ApduError::InvalidLength));
            }

            let stream = self.stream.as_mut().ok_or(Error::Disconnected)?;

            let header = RequestHeader {
                interface,
                apdu: cmd.header,
                len: cmd.data.len() as u32,
            };

            let mut buff = vec![0u8; RequestHeader::LEN + cmd.data.len()];
            header.encode(&mut buff).map_err(Error::Frame)?;
            buff[RequestHeader::LEN..].copy_from_slice(&cmd.data);

            stream.write_all(&buff).await.map_err(map_eof)?;
            self.pending = Some(interface);

            Ok(())
        }

        async fn receive(
            &mut self,
            interface: Interface,
            timeout: Duration,
        ) -> Result<Option<CommandResult>, Error> {
            if self.pending != Some(interface) {
                return Err(Error::UnexpectedResponse);
            }

            let stream = self.stream.as_mut().ok_or(Error::Disconnected)?;

            let r = tokio::time::timeout(timeout, Self::read_response(stream)).await;

            match r {
                Ok(Ok(r)) => {
                    self.pending = None;
                    Ok(Some(r))
                }
                Ok(Err(e)) => {
                    self.pending = None;
                    Err(e)
                }
                // A late response would desynchronise the stream, drop the connection
                Err(_) => {
                    warn!("Response timeout, closing connection");
                    self.pending = None;
                    self.stream = None;
                    Ok(None)
                }
            }
        }
    }
}
