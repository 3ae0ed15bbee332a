// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Handle for connected terminals
//!
//! This provides methods for interacting with the terminal
//! and is generic over [Channel]

use std::{sync::Arc, time::Duration};

use encdec::DecodeOwned;
use log::debug;
use tokio::sync::Mutex;

use rki_apdu::{
    prelude::{
        DisplayReq, KeyImportReq, KeyImportResp, SecureFlags, SecureInitReq, SecureStateReq,
        SecureStateResp,
    },
    ApduError, ApduReq, Interface,
};

use crate::{
    transport::{exchange, Channel, Command, CommandResult},
    Error,
};

/// Default timeout for command responses
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Handle for a connected terminal [Channel].
///
/// The channel is shared behind a mutex held for the duration of each
/// exchange, so at most one command is ever in flight.
pub struct DeviceHandle<T: Channel> {
    /// Channel for communication
    t: Arc<Mutex<T>>,
    /// Timeout for command responses
    request_timeout: Duration,
}

impl<T: Channel> Clone for DeviceHandle<T> {
    fn clone(&self) -> Self {
        Self {
            t: self.t.clone(),
            request_timeout: self.request_timeout,
        }
    }
}

/// Create a [DeviceHandle] wrapper from a type implementing [Channel]
impl<T: Channel> From<T> for DeviceHandle<T> {
    fn from(t: T) -> Self {
        Self {
            t: Arc::new(Mutex::new(t)),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// Terminal secure storage state
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub struct SecureState {
    /// Key injection mode active
    pub initialised: bool,
    /// PIN key provisioned
    pub pin_key_ready: bool,
    /// SRED key provisioned
    pub sred_key_ready: bool,
}

impl SecureState {
    /// Check whether at least one key purpose is provisioned
    pub fn any_key_ready(&self) -> bool {
        self.pin_key_ready || self.sred_key_ready
    }
}

impl From<SecureFlags> for SecureState {
    fn from(f: SecureFlags) -> Self {
        Self {
            initialised: f.contains(SecureFlags::INITIALISED),
            pin_key_ready: f.contains(SecureFlags::PIN_KEY_READY),
            sred_key_ready: f.contains(SecureFlags::SRED_KEY_READY),
        }
    }
}

impl<T: Channel> DeviceHandle<T> {
    /// Override the command response timeout
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Fetch the command response timeout
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Exchange a single command, returning the raw [CommandResult] without status checks
    pub async fn exchange(
        &self,
        interface: Interface,
        req: &impl ApduReq,
    ) -> Result<CommandResult, Error> {
        let cmd = Command::encode(req)?;

        let mut t = self.t.lock().await;
        exchange(&mut *t, interface, &cmd, self.request_timeout).await
    }

    /// Issue a request, checking the response status and decoding the response body
    pub async fn request<RESP>(&self, interface: Interface, req: &impl ApduReq) -> Result<RESP, Error>
    where
        RESP: DecodeOwned<Output = RESP, Error = ApduError>,
    {
        let r = self.exchange(interface, req).await?;

        if !r.status_ok() {
            return Err(Error::Status(r.status));
        }

        let (resp, _n) = RESP::decode_owned(&r.body)?;

        Ok(resp)
    }

    /// Issue a request with no response body, checking only the response status
    pub async fn command(&self, interface: Interface, req: &impl ApduReq) -> Result<(), Error> {
        let r = self.exchange(interface, req).await?;

        match r.status_ok() {
            true => Ok(()),
            false => Err(Error::Status(r.status)),
        }
    }

    /// Display a prompt on the terminal
    pub async fn display(&self, interface: Interface, text: &str) -> Result<(), Error> {
        debug!("Display: '{}'", text);

        self.command(interface, &DisplayReq::new(text)).await
    }

    /// Fetch terminal secure storage state
    pub async fn secure_state(&self, interface: Interface) -> Result<SecureState, Error> {
        let resp = self
            .request::<SecureStateResp>(interface, &SecureStateReq {})
            .await?;

        let s = SecureState::from(resp.flags);

        debug!("Secure state: {:?}", s);

        Ok(s)
    }

    /// Initialise secure storage, entering key injection mode
    pub async fn secure_init(&self, interface: Interface) -> Result<(), Error> {
        debug!("Initialising secure state");

        self.command(interface, &SecureInitReq {}).await
    }

    /// Import uploaded key material, returning an error for any non-zero import code
    pub async fn key_import(&self, interface: Interface) -> Result<(), Error> {
        debug!("Importing keys");

        let resp = self
            .request::<KeyImportResp>(interface, &KeyImportReq {})
            .await?;

        match resp.is_ok() {
            true => Ok(()),
            false => Err(Error::ImportRejected(resp.code)),
        }
    }
}
