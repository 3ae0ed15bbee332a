// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Remote key injection (RKI)
//!
//! Provisions terminal keys by combining terminal bootstrap certificates with
//! key material issued by a remote key host. A run follows a single forward
//! path with no retries:
//!
//! ```text
//! Idle -> Initialising -> ReadingBootstrapFiles -> ContactingHost
//!      -> InjectingKeys -> ConfirmingState -> Complete | Failed
//! ```
//!
//! Callers wishing to retry must re-run the whole operation, no rollback of
//! partially injected keys is performed. Runs may be aborted by closing the
//! underlying channel or aborting the task returned by [spawn].

use log::{debug, info, warn};
use tokio::{
    sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender},
    task::JoinHandle,
};

use rki_apdu::Interface;

use crate::{
    file::{TransferOptions, UploadSource},
    handle::SecureState,
    host::{HostProvisioningRequest, HostTransport, KeyHostClient},
    transport::Channel,
    DeviceHandle, Error, ErrorKind,
};

mod keys;
pub use keys::*;

/// Injection state, published via [RkiEvent::State]
#[derive(Copy, Clone, Debug, PartialEq, Eq, strum::Display)]
pub enum RkiState {
    Idle,
    Initialising,
    ReadingBootstrapFiles,
    ContactingHost,
    InjectingKeys,
    ConfirmingState,
    Complete,
    Failed,
}

/// Events published during an injection run
#[derive(Clone, Debug, PartialEq)]
pub enum RkiEvent {
    /// State transition
    State(RkiState),
    /// Bootstrap file download progress (completed fraction)
    Download { file: &'static str, progress: f32 },
    /// Key file upload progress (bytes sent)
    Upload { file: &'static str, sent: u64 },
    /// Non-fatal display failure
    DisplayWarning(String),
}

/// Injection failure reasons
#[derive(Debug, thiserror::Error)]
pub enum RkiError {
    #[error("Display prompt failed: {0}")]
    DisplayFailed(#[source] Error),

    #[error("Secure state initialisation failed: {0}")]
    InitialiseFailed(#[source] Error),

    #[error("Secure state initialisation not confirmed")]
    InitialiseNotConfirmed,

    #[error("Bootstrap download of '{file}' failed: {source}")]
    BootstrapDownloadFailed {
        file: &'static str,
        #[source]
        source: Error,
    },

    #[error("Key host request failed: {0}")]
    Host(#[source] Error),

    #[error("Decoding key file '{file}' failed: {source}")]
    KeyDecodeFailed {
        file: &'static str,
        #[source]
        source: Error,
    },

    #[error("Upload of '{file}' failed: {source}")]
    UploadFailed {
        file: &'static str,
        #[source]
        source: Error,
    },

    #[error("Key import failed: {0}")]
    ImportFailed(#[source] Error),

    #[error("Secure state unavailable: {0}")]
    StatusUnavailable(#[source] Error),

    #[error("Secure state still initialised following import")]
    UnexpectedlyStillInitialised,

    #[error("No keys ready following import")]
    NoKeyReady,
}

impl RkiError {
    /// Fetch the [ErrorKind] for this failure
    pub fn kind(&self) -> ErrorKind {
        use RkiError::*;

        match self {
            InitialiseNotConfirmed | UnexpectedlyStillInitialised | NoKeyReady => ErrorKind::State,
            DisplayFailed(e)
            | InitialiseFailed(e)
            | Host(e)
            | ImportFailed(e)
            | StatusUnavailable(e) => e.kind(),
            BootstrapDownloadFailed { source, .. }
            | KeyDecodeFailed { source, .. }
            | UploadFailed { source, .. } => source.kind(),
        }
    }
}

/// Prompt failure policy
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PromptPolicy {
    /// Prompt failures abort the run
    Strict,
    /// Prompt failures are logged and ignored
    BestEffort,
}

/// Operator prompts shown during injection
#[derive(Clone, Debug, PartialEq)]
pub struct Prompts {
    pub preparing: String,
    pub connecting: String,
    pub received: String,
    pub complete: String,
}

impl Default for Prompts {
    fn default() -> Self {
        Self {
            preparing: "Preparing key injection".to_string(),
            connecting: "Connecting to key host".to_string(),
            received: "Keys received".to_string(),
            complete: "Key injection complete".to_string(),
        }
    }
}

/// Injection configuration
#[derive(Clone, Debug, PartialEq)]
pub struct RkiConfig {
    /// Terminal interface for all commands
    pub interface: Interface,
    /// Bootstrap file download options
    pub download: TransferOptions,
    /// Key file upload options
    pub upload: TransferOptions,
    /// Prompt failure policy (prior to confirmation)
    pub prompts: PromptPolicy,
    /// Prompt text
    pub text: Prompts,
}

impl Default for RkiConfig {
    fn default() -> Self {
        Self {
            interface: Interface::Primary,
            download: TransferOptions::download(),
            upload: TransferOptions::upload(),
            prompts: PromptPolicy::Strict,
            text: Prompts::default(),
        }
    }
}

/// Successful injection report
#[derive(Debug)]
pub struct RkiReport {
    /// Secure state following injection
    pub state: SecureState,
    /// Set where the final confirmation prompt failed.
    ///
    /// Keys are already injected at this point, so this does not fail the run.
    pub display_warning: Option<Error>,
}

/// Run a key injection using the provided terminal and key host.
///
/// State transitions and transfer progress are published to `events` where provided.
pub async fn inject<T: Channel, H: HostTransport>(
    device: &DeviceHandle<T>,
    host: &KeyHostClient<H>,
    cfg: &RkiConfig,
    events: Option<UnboundedSender<RkiEvent>>,
) -> Result<RkiReport, RkiError> {
    let r = Injector {
        device,
        host,
        cfg,
        events,
    };

    r.emit(RkiEvent::State(RkiState::Idle));

    match r.run().await {
        Ok(v) => {
            info!("Key injection complete: {:?}", v.state);
            r.emit(RkiEvent::State(RkiState::Complete));
            Ok(v)
        }
        Err(e) => {
            warn!("Key injection failed: {}", e);
            r.emit(RkiEvent::State(RkiState::Failed));
            Err(e)
        }
    }
}

/// Spawn a key injection on a background task.
///
/// Returns a [JoinHandle] resolving to the run result, and a receiver for
/// [RkiEvent]s published during the run.
pub fn spawn<T, H>(
    device: DeviceHandle<T>,
    host: KeyHostClient<H>,
    cfg: RkiConfig,
) -> (
    JoinHandle<Result<RkiReport, RkiError>>,
    UnboundedReceiver<RkiEvent>,
)
where
    T: Channel + 'static,
    H: HostTransport + 'static,
{
    let (tx, rx) = unbounded_channel();

    let h = tokio::spawn(async move { inject(&device, &host, &cfg, Some(tx)).await });

    (h, rx)
}

struct Injector<'a, T: Channel, H: HostTransport> {
    device: &'a DeviceHandle<T>,
    host: &'a KeyHostClient<H>,
    cfg: &'a RkiConfig,
    events: Option<UnboundedSender<RkiEvent>>,
}

impl<'a, T: Channel, H: HostTransport> Injector<'a, T, H> {
    fn emit(&self, e: RkiEvent) {
        if let Some(tx) = &self.events {
            // Receiver may have been dropped, events are informational only
            let _ = tx.send(e);
        }
    }

    fn enter(&self, s: RkiState) {
        info!("RKI: {}", s);
        self.emit(RkiEvent::State(s));
    }

    async fn run(&self) -> Result<RkiReport, RkiError> {
        self.initialise().await?;

        let req = self.read_bootstrap().await?;

        self.enter(RkiState::ContactingHost);
        self.prompt(&self.cfg.text.connecting).await?;

        let resp = self
            .host
            .request_provisioning(&req)
            .await
            .map_err(RkiError::Host)?;

        self.enter(RkiState::InjectingKeys);
        self.prompt(&self.cfg.text.received).await?;

        let files = derive_key_files(&resp)
            .map_err(|(file, source)| RkiError::KeyDecodeFailed { file, source })?;

        self.write_keys(&files).await?;

        self.confirm().await
    }

    /// Display a prompt, applying the configured [PromptPolicy]
    async fn prompt(&self, text: &str) -> Result<(), RkiError> {
        match self.device.display(self.cfg.interface, text).await {
            Ok(()) => Ok(()),
            Err(e) if self.cfg.prompts == PromptPolicy::BestEffort => {
                warn!("Ignoring display failure: {}", e);
                self.emit(RkiEvent::DisplayWarning(e.to_string()));
                Ok(())
            }
            Err(e) => Err(RkiError::DisplayFailed(e)),
        }
    }

    async fn initialise(&self) -> Result<(), RkiError> {
        let i = self.cfg.interface;

        self.enter(RkiState::Initialising);
        self.prompt(&self.cfg.text.preparing).await?;

        self.device
            .secure_init(i)
            .await
            .map_err(RkiError::InitialiseFailed)?;

        match self.device.secure_state(i).await {
            Ok(s) if s.initialised => Ok(()),
            Ok(s) => {
                debug!("Secure state not initialised: {:?}", s);
                Err(RkiError::InitialiseNotConfirmed)
            }
            Err(e) => {
                debug!("Secure state query failed: {}", e);
                Err(RkiError::InitialiseNotConfirmed)
            }
        }
    }

    async fn read_bootstrap(&self) -> Result<HostProvisioningRequest, RkiError> {
        self.enter(RkiState::ReadingBootstrapFiles);

        let [prod_sign, terminal, temp_load, iksn] = BOOTSTRAP_FILES;

        Ok(HostProvisioningRequest::new(
            self.read_text(prod_sign).await?,
            self.read_text(terminal).await?,
            self.read_text(temp_load).await?,
            self.read_text(iksn).await?,
        ))
    }

    /// Download a bootstrap file as UTF-8 text
    async fn read_text(&self, file: &'static str) -> Result<String, RkiError> {
        let events = self.events.clone();
        let progress = move |progress| {
            if let Some(tx) = &events {
                let _ = tx.send(RkiEvent::Download { file, progress });
            }
        };

        let data = self
            .device
            .download(self.cfg.interface, file, &self.cfg.download, progress)
            .await
            .map_err(|source| RkiError::BootstrapDownloadFailed { file, source })?;

        String::from_utf8(data).map_err(|_| RkiError::BootstrapDownloadFailed {
            file,
            source: Error::Utf8(file.to_string()),
        })
    }

    async fn write_keys(&self, files: &[DerivedKeyFile]) -> Result<(), RkiError> {
        let i = self.cfg.interface;

        for f in files {
            let file = f.name;
            let events = self.events.clone();
            let progress = move |sent| {
                if let Some(tx) = &events {
                    let _ = tx.send(RkiEvent::Upload { file, sent });
                }
            };

            self.device
                .upload(
                    i,
                    file,
                    UploadSource::from_slice(&f.data),
                    &self.cfg.upload,
                    progress,
                )
                .await
                .map_err(|source| RkiError::UploadFailed { file, source })?;
        }

        self.device
            .key_import(i)
            .await
            .map_err(RkiError::ImportFailed)
    }

    async fn confirm(&self) -> Result<RkiReport, RkiError> {
        let i = self.cfg.interface;

        self.enter(RkiState::ConfirmingState);

        let state = self
            .device
            .secure_state(i)
            .await
            .map_err(RkiError::StatusUnavailable)?;

        if state.initialised {
            return Err(RkiError::UnexpectedlyStillInitialised);
        }
        if !state.any_key_ready() {
            return Err(RkiError::NoKeyReady);
        }

        // Keys are in place, a failed confirmation prompt is reported but not fatal
        let display_warning = match self.device.display(i, &self.cfg.text.complete).await {
            Ok(()) => None,
            Err(e) => {
                warn!("Confirmation prompt failed: {}", e);
                self.emit(RkiEvent::DisplayWarning(e.to_string()));
                Some(e)
            }
        };

        Ok(RkiReport {
            state,
            display_warning,
        })
    }
}
