// Copyright (c) 2022-2023 The MobileCoin Foundation

use rki_apdu::{ApduError, StatusCode};
use tokio::time::error::Elapsed;

/// Terminal RKI API Error Type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Transport I/O error
    #[error("Transport error: {0}")]
    Io(#[from] std::io::Error),

    /// Request timeout
    #[error("Timeout waiting for device response")]
    RequestTimeout,

    /// Channel closed or desynchronised
    #[error("Device disconnected")]
    Disconnected,

    /// Invalid frame received from transport
    #[error("Invalid frame: {0}")]
    Frame(ApduError),

    /// Command returned a failure status
    #[error("Command failed with status {0}")]
    Status(StatusCode),

    /// APDU encode / decode failure
    #[error("APDU encoding error: {0}")]
    Apdu(ApduError),

    /// Unexpected APDU response
    #[error("Unexpected APDU response")]
    UnexpectedResponse,

    /// File select for reading failed
    #[error("File '{0}' not found")]
    FileNotFound(String),

    /// File selected for reading has no content
    #[error("File '{0}' is empty")]
    EmptyFile(String),

    /// File select for writing failed
    #[error("Failed to create file '{0}'")]
    FileCreateFailed(String),

    /// Chunk read or write failed
    #[error("Transfer failed at offset {offset}")]
    TransferFailed { offset: u64 },

    /// Terminal import reported an error code
    #[error("Key import failed with code 0x{0:04x}")]
    ImportRejected(u16),

    /// Key host connection failed
    #[error("Key host unreachable: {0}")]
    HostUnreachable(String),

    /// Key host response could not be parsed / validated
    #[error("Malformed key host response: {0}")]
    HostResponseMalformed(String),

    /// Key host returned a non-success result
    #[error("Key host rejected request (result: {0})")]
    HostRejected(String),

    /// Local stream read / close failure
    #[error("Local I/O error: {0}")]
    LocalIo(std::io::Error),

    /// Invalid caller-provided argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// Data was not valid UTF-8
    #[error("Invalid UTF-8 in '{0}'")]
    Utf8(String),

    /// Hex decoding failure
    #[error("Hex decode failed: {0}")]
    HexDecode(#[from] hex::FromHexError),
}

/// Error classification, used to distinguish failure domains
#[derive(Copy, Clone, Debug, PartialEq, Eq, strum::Display)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Timeout, disconnect, no response
    Transport,
    /// Non-success status, file select failure, truncated chunk
    DeviceProtocol,
    /// Key host unreachable, malformed or rejected
    Host,
    /// Local stream failure
    LocalIo,
    /// Invalid input or data encoding
    Input,
    /// Secure state precondition / postcondition violated
    State,
}

impl Error {
    /// Fetch the [ErrorKind] for this error
    pub fn kind(&self) -> ErrorKind {
        use Error::*;

        match self {
            Io(_) | RequestTimeout | Disconnected | Frame(_) => ErrorKind::Transport,
            Status(_) | Apdu(_) | UnexpectedResponse | FileNotFound(_) | EmptyFile(_)
            | FileCreateFailed(_) | TransferFailed { .. } | ImportRejected(_) => {
                ErrorKind::DeviceProtocol
            }
            HostUnreachable(_) | HostResponseMalformed(_) | HostRejected(_) => ErrorKind::Host,
            LocalIo(_) => ErrorKind::LocalIo,
            InvalidArgument(_) | Utf8(_) | HexDecode(_) => ErrorKind::Input,
        }
    }
}

impl From<Elapsed> for Error {
    fn from(_: Elapsed) -> Self {
        Error::RequestTimeout
    }
}

impl From<ApduError> for Error {
    fn from(e: ApduError) -> Self {
        Error::Apdu(e)
    }
}
