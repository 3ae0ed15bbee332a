// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Response status words

/// Response status word, returned with every command response.
///
/// Values in `0x9000..=0x90ff` indicate success, the low byte carries
/// command-specific information. Everything else is an error.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct StatusCode(pub u16);

impl StatusCode {
    /// Command completed successfully
    pub const OK: StatusCode = StatusCode(0x9000);

    /// Incorrect parameters / payload
    pub const WRONG_DATA: StatusCode = StatusCode(0x6a80);

    /// Referenced file does not exist
    pub const FILE_NOT_FOUND: StatusCode = StatusCode(0x6a82);

    /// Not enough storage for the requested write
    pub const NOT_ENOUGH_SPACE: StatusCode = StatusCode(0x6a84);

    /// Command not allowed in the current secure state
    pub const SECURITY_STATUS: StatusCode = StatusCode(0x6982);

    /// Conditions of use not satisfied (eg. no file selected)
    pub const CONDITIONS_NOT_SATISFIED: StatusCode = StatusCode(0x6985);

    /// Instruction not supported
    pub const INS_NOT_SUPPORTED: StatusCode = StatusCode(0x6d00);

    /// Generic memory / execution failure
    pub const EXECUTION_ERROR: StatusCode = StatusCode(0x6f00);

    /// Check whether the status word indicates success
    pub fn is_ok(&self) -> bool {
        (0x9000..=0x90ff).contains(&self.0)
    }
}

impl From<u16> for StatusCode {
    fn from(v: u16) -> Self {
        Self(v)
    }
}

impl From<StatusCode> for u16 {
    fn from(s: StatusCode) -> Self {
        s.0
    }
}

impl core::fmt::Debug for StatusCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "StatusCode(0x{:04x})", self.0)
    }
}

impl core::fmt::Display for StatusCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "0x{:04x}", self.0)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn status_ok_range() {
        assert!(StatusCode::OK.is_ok());
        assert!(StatusCode(0x90ff).is_ok());
        assert!(!StatusCode(0x9100).is_ok());
        assert!(!StatusCode(0x8fff).is_ok());
        assert!(!StatusCode::FILE_NOT_FOUND.is_ok());
    }
}
