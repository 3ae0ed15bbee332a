// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Payment terminal file transfer and remote key injection (RKI) library (and CLI)
//!
//! - [DeviceHandle] provides terminal commands over a [transport::Channel],
//!   including chunked [download][DeviceHandle::download] and
//!   [upload][DeviceHandle::upload] of terminal-resident files
//! - [host::KeyHostClient] requests key material from a remote key host
//! - [inject] combines these to provision terminal keys
//!

/// Command channel abstraction and transports
pub mod transport;

/// Re-export `rki-apdu` for consumers
pub use rki_apdu::{self as apdu};

mod handle;
pub use handle::{DeviceHandle, SecureState, DEFAULT_REQUEST_TIMEOUT};

mod error;
pub use error::{Error, ErrorKind};

pub mod file;
pub use file::{TransferOptions, UploadSource};

pub mod host;

pub mod inject;
pub use inject::spawn;
