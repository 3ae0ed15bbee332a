// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Simulated terminal command handling

use std::collections::{HashMap, HashSet};

use encdec::{Decode, DecodeOwned, Encode};
use log::{debug, trace, warn};

use rki::inject::KEY_FILES;
use rki_apdu::{prelude::*, ApduError, ApduHeader, Instruction, RKI_APDU_CLA};

/// Import code returned where key files are missing
pub const IMPORT_MISSING_FILE: u16 = 0x0101;

/// Fault injection configuration
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Faults {
    /// Cap read responses at this many bytes
    pub max_read: Option<usize>,
    /// Fail reads starting at this offset
    pub fail_read_at: Option<u32>,
    /// Fail selects for these file names
    pub fail_select: HashSet<String>,
    /// Fail writes to these file names
    pub fail_write: HashSet<String>,
    /// Return this code from key import
    pub import_error: Option<u16>,
    /// Leave the secure state initialised following import
    pub import_keeps_initialised: bool,
    /// Complete import without marking any key ready
    pub import_without_keys: bool,
    /// Fail display requests containing this text
    pub fail_display: Option<String>,
    /// Fail secure state initialisation
    pub fail_init: bool,
    /// Accept initialisation without updating the secure state
    pub init_not_applied: bool,
    /// Stop responding once this many commands have been handled
    pub drop_responses_after: Option<usize>,
}

/// Record of a command received by the simulated terminal
#[derive(Clone, Debug, PartialEq)]
pub struct CommandRecord {
    pub interface: Interface,
    pub ins: u8,
    pub p1: u8,
    /// File selected when the command was handled
    pub file: Option<String>,
    /// Read / write offset, where applicable
    pub offset: Option<u32>,
    /// Payload length (requested length for reads)
    pub len: usize,
}

impl CommandRecord {
    /// Check whether this record matches the provided instruction
    pub fn is(&self, ins: Instruction) -> bool {
        self.ins == ins as u8
    }
}

/// Simulated terminal state
#[derive(Clone, Debug, Default)]
pub struct Terminal {
    /// Terminal-resident files
    pub files: HashMap<String, Vec<u8>>,
    /// Selected file per interface
    pub selected: HashMap<Interface, String>,
    /// Secure storage flags
    pub flags: SecureFlags,
    /// Displayed prompts
    pub display: Vec<String>,
    /// Handled commands
    pub commands: Vec<CommandRecord>,
    /// Active faults
    pub faults: Faults,
}

impl Terminal {
    /// Create an empty terminal
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle a single command, returning the response status and body.
    ///
    /// Returns `None` where the response is dropped.
    pub fn handle(
        &mut self,
        interface: Interface,
        header: ApduHeader,
        data: &[u8],
    ) -> Option<(StatusCode, Vec<u8>)> {
        if let Some(n) = self.faults.drop_responses_after {
            if self.commands.len() >= n {
                warn!("Dropping response to ins 0x{:02x}", header.ins);
                return None;
            }
        }

        let mut record = CommandRecord {
            interface,
            ins: header.ins,
            p1: header.p1,
            file: self.selected.get(&interface).cloned(),
            offset: None,
            len: data.len(),
        };

        let r = match self.dispatch(interface, header, data, &mut record) {
            Ok(v) => v,
            Err(e) => {
                debug!("Invalid request (ins: 0x{:02x}): {}", header.ins, e);
                (StatusCode::WRONG_DATA, vec![])
            }
        };

        trace!("{:?} -> {}", record, r.0);

        self.commands.push(record);

        Some(r)
    }

    fn dispatch(
        &mut self,
        interface: Interface,
        header: ApduHeader,
        data: &[u8],
        record: &mut CommandRecord,
    ) -> Result<(StatusCode, Vec<u8>), ApduError> {
        if header.cla != RKI_APDU_CLA {
            return Ok((StatusCode::INS_NOT_SUPPORTED, vec![]));
        }

        let ins = match Instruction::try_from(header.ins) {
            Ok(v) => v,
            Err(_) => return Ok((StatusCode::INS_NOT_SUPPORTED, vec![])),
        };

        match ins {
            Instruction::Display => {
                let (req, _) = DisplayReq::decode(data)?;
                self.display(req.text)
            }
            Instruction::SecureInit => Ok(self.secure_init()),
            Instruction::SecureState => encode(StatusCode::OK, &SecureStateResp::new(self.flags)),
            Instruction::KeyImport => {
                let code = self.key_import();
                encode(StatusCode::OK, &KeyImportResp::new(code))
            }
            Instruction::FileSelect => {
                let (req, _) = FileSelectReq::decode(data)?;
                record.file = Some(req.name.to_string());
                self.select(interface, req.mode, req.name)
            }
            Instruction::FileRead => {
                let (req, _) = FileReadReq::decode_owned(data)?;
                record.offset = Some(req.offset);
                record.len = req.len as usize;
                Ok(self.read(interface, &req))
            }
            Instruction::FileWrite => {
                let (req, _) = FileWriteReq::decode(data)?;
                record.offset = Some(req.offset);
                record.len = req.data.len();
                Ok(self.write(interface, &req))
            }
        }
    }

    fn display(&mut self, text: &str) -> Result<(StatusCode, Vec<u8>), ApduError> {
        if let Some(f) = &self.faults.fail_display {
            if text.contains(f.as_str()) {
                return Ok((StatusCode::EXECUTION_ERROR, vec![]));
            }
        }

        debug!("Display: '{}'", text);
        self.display.push(text.to_string());

        Ok((StatusCode::OK, vec![]))
    }

    fn secure_init(&mut self) -> (StatusCode, Vec<u8>) {
        if self.faults.fail_init {
            return (StatusCode::SECURITY_STATUS, vec![]);
        }

        if !self.faults.init_not_applied {
            self.flags = SecureFlags::INITIALISED;
        }

        (StatusCode::OK, vec![])
    }

    fn key_import(&mut self) -> u16 {
        if let Some(code) = self.faults.import_error {
            return code;
        }

        if !self.flags.contains(SecureFlags::INITIALISED) {
            return IMPORT_MISSING_FILE;
        }

        if let Some(f) = KEY_FILES.iter().find(|f| !self.files.contains_key(**f)) {
            debug!("Import failed, missing '{}'", f);
            return IMPORT_MISSING_FILE;
        }

        if !self.faults.import_keeps_initialised {
            self.flags.remove(SecureFlags::INITIALISED);
        }

        if !self.faults.import_without_keys {
            self.flags
                .insert(SecureFlags::PIN_KEY_READY | SecureFlags::SRED_KEY_READY);
        }

        KeyImportResp::NO_ERROR
    }

    fn select(
        &mut self,
        interface: Interface,
        mode: SelectMode,
        name: &str,
    ) -> Result<(StatusCode, Vec<u8>), ApduError> {
        self.selected.remove(&interface);

        if self.faults.fail_select.contains(name) {
            return encode(StatusCode::FILE_NOT_FOUND, &FileSelectResp::new(-1));
        }

        let size = match mode {
            SelectMode::Read => match self.files.get(name) {
                Some(f) => f.len(),
                None => return encode(StatusCode::FILE_NOT_FOUND, &FileSelectResp::new(-1)),
            },
            SelectMode::Truncate => {
                self.files.insert(name.to_string(), vec![]);
                0
            }
        };

        self.selected.insert(interface, name.to_string());

        encode(StatusCode::OK, &FileSelectResp::new(size as i32))
    }

    fn read(&mut self, interface: Interface, req: &FileReadReq) -> (StatusCode, Vec<u8>) {
        let f = match self.selected.get(&interface).and_then(|n| self.files.get(n)) {
            Some(f) => f,
            None => return (StatusCode::CONDITIONS_NOT_SATISFIED, vec![]),
        };

        if self.faults.fail_read_at.map(|o| req.offset >= o) == Some(true) {
            return (StatusCode::EXECUTION_ERROR, vec![]);
        }

        let offset = req.offset as usize;
        if offset >= f.len() {
            return (StatusCode::WRONG_DATA, vec![]);
        }

        let mut len = (req.len as usize).min(f.len() - offset);
        if let Some(m) = self.faults.max_read {
            len = len.min(m);
        }

        (StatusCode::OK, f[offset..][..len].to_vec())
    }

    fn write(&mut self, interface: Interface, req: &FileWriteReq) -> (StatusCode, Vec<u8>) {
        let name = match self.selected.get(&interface) {
            Some(n) => n,
            None => return (StatusCode::CONDITIONS_NOT_SATISFIED, vec![]),
        };

        if self.faults.fail_write.contains(name) {
            return (StatusCode::NOT_ENOUGH_SPACE, vec![]);
        }

        let f = match self.files.get_mut(name) {
            Some(f) => f,
            None => return (StatusCode::CONDITIONS_NOT_SATISFIED, vec![]),
        };

        // Writes must be contiguous
        let offset = req.offset as usize;
        if offset != f.len() {
            return (StatusCode::WRONG_DATA, vec![]);
        }

        f.extend_from_slice(req.data);

        (StatusCode::OK, vec![])
    }
}

/// Encode a response body
fn encode(
    status: StatusCode,
    resp: &impl Encode<Error = ApduError>,
) -> Result<(StatusCode, Vec<u8>), ApduError> {
    let mut buff = vec![0u8; resp.encode_len()?];
    let n = resp.encode(&mut buff)?;
    buff.truncate(n);

    Ok((status, buff))
}
