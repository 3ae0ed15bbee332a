// Copyright (c) 2022-2023 The MobileCoin Foundation

//! In-memory payment terminal simulator
//!
//! Provides a [Sim] terminal that may be driven in-process via [SimChannel]
//! or over TCP using [serve], along with a scripted [MockKeyHost] for
//! exercising key injection without network access.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use async_trait::async_trait;
use log::debug;

use rki::{
    transport::{Channel, Command, CommandResult},
    Error,
};
use rki_apdu::{prelude::SecureFlags, Interface};

mod terminal;
pub use terminal::*;

mod server;
pub use server::serve;

mod host;
pub use host::*;

/// Shared simulated terminal handle
#[derive(Clone, Debug, Default)]
pub struct Sim {
    t: Arc<Mutex<Terminal>>,
}

impl Sim {
    /// Create a new simulated terminal with no files
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new simulated terminal with the provided files
    pub fn with_files<'a>(files: impl IntoIterator<Item = (&'a str, &'a [u8])>) -> Self {
        let s = Self::new();
        for (name, data) in files {
            s.put_file(name, data);
        }
        s
    }

    /// Lock the terminal state for inspection or modification
    pub fn terminal(&self) -> MutexGuard<'_, Terminal> {
        // Terminal state remains consistent where a holder panicked
        match self.t.lock() {
            Ok(g) => g,
            Err(e) => e.into_inner(),
        }
    }

    /// Store a terminal-resident file
    pub fn put_file(&self, name: &str, data: &[u8]) {
        self.terminal().files.insert(name.to_string(), data.to_vec());
    }

    /// Fetch a terminal-resident file
    pub fn file(&self, name: &str) -> Option<Vec<u8>> {
        self.terminal().files.get(name).cloned()
    }

    /// Fetch all terminal-resident files
    pub fn files(&self) -> HashMap<String, Vec<u8>> {
        self.terminal().files.clone()
    }

    /// Fetch the secure storage flags
    pub fn flags(&self) -> SecureFlags {
        self.terminal().flags
    }

    /// Set the secure storage flags
    pub fn set_flags(&self, flags: SecureFlags) {
        self.terminal().flags = flags;
    }

    /// Modify active faults
    pub fn faults(&self, f: impl FnOnce(&mut Faults)) {
        f(&mut self.terminal().faults)
    }

    /// Fetch displayed prompts
    pub fn display_log(&self) -> Vec<String> {
        self.terminal().display.clone()
    }

    /// Fetch handled commands
    pub fn commands(&self) -> Vec<CommandRecord> {
        self.terminal().commands.clone()
    }

    /// Clear the command log
    pub fn clear_commands(&self) {
        self.terminal().commands.clear()
    }

    /// Handle a single command
    pub fn handle(&self, interface: Interface, cmd: &Command) -> Option<CommandResult> {
        self.terminal()
            .handle(interface, cmd.header, &cmd.data)
            .map(|(status, body)| CommandResult::new(status, body))
    }

    /// Create an in-process [Channel] to this terminal
    pub fn channel(&self) -> SimChannel {
        SimChannel {
            sim: self.clone(),
            pending: HashMap::new(),
            closed: false,
        }
    }
}

/// In-process [Channel] to a [Sim] terminal
pub struct SimChannel {
    sim: Sim,
    pending: HashMap<Interface, Option<CommandResult>>,
    closed: bool,
}

impl SimChannel {
    /// Close the channel, subsequent commands fail with [Error::Disconnected]
    pub fn close(&mut self) {
        self.closed = true;
        self.pending.clear();
    }
}

#[async_trait]
impl Channel for SimChannel {
    async fn send(&mut self, interface: Interface, cmd: &Command) -> Result<(), Error> {
        if self.closed {
            return Err(Error::Disconnected);
        }

        let r = self.sim.handle(interface, cmd);
        self.pending.insert(interface, r);

        Ok(())
    }

    async fn receive(
        &mut self,
        interface: Interface,
        timeout: Duration,
    ) -> Result<Option<CommandResult>, Error> {
        if self.closed {
            return Err(Error::Disconnected);
        }

        match self.pending.remove(&interface) {
            Some(Some(r)) => Ok(Some(r)),
            // Dropped response, wait out the timeout
            Some(None) => {
                debug!("No response, waiting {:?}", timeout);
                tokio::time::sleep(timeout).await;
                Ok(None)
            }
            None => Err(Error::UnexpectedResponse),
        }
    }
}
