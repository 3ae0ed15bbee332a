// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Protocol / APDU definitions for payment terminal file transfer and remote key injection
//!
//! This module provides the command set used to move files to and from a terminal
//! in bounded chunks, query and drive the terminal's secure key storage, and
//! prompt the operator via the terminal display.
//!
//! All field encodings are little-endian. Requests carry fixed-size headers
//! padded to 32-bit alignment followed by any variable length payload, responses
//! are either a small fixed structure or raw file data.
//!

#![no_std]

use core::fmt::Debug;

pub mod display;
pub mod file;
pub mod frame;
pub mod prelude;
pub mod secure;
pub mod status;

mod helpers;

pub use status::StatusCode;

/// Terminal APDU Class
pub const RKI_APDU_CLA: u8 = 0xd0;

/// Terminal APDU instruction codes
#[derive(Copy, Clone, Debug, PartialEq, num_enum::TryFromPrimitive, strum::Display)]
#[repr(u8)]
pub enum Instruction {
    /// Write a line of text to the terminal display
    Display = 0x01,

    /// Enter key injection mode, initialising secure storage
    SecureInit = 0x20,

    /// Fetch secure storage state flags
    SecureState = 0x21,

    /// Import previously uploaded key material
    KeyImport = 0x22,

    /// Select a file for reading or (truncating) writing
    FileSelect = 0x30,

    /// Read a chunk of the selected file
    FileRead = 0x31,

    /// Write a chunk of the selected file
    FileWrite = 0x32,
}

/// Logical command interface on the terminal
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, num_enum::TryFromPrimitive, strum::Display)]
#[repr(u8)]
pub enum Interface {
    /// Primary (application) command interface
    Primary = 0x00,
    /// Secondary (maintenance) command interface
    Secondary = 0x01,
}

impl Default for Interface {
    fn default() -> Self {
        Interface::Primary
    }
}

/// APDU encoding / decoding errors
#[derive(Copy, Clone, Debug, PartialEq, strum::Display)]
pub enum ApduError {
    /// Buffer too short for encode / decode
    InvalidLength,
    /// Field contained an invalid value
    InvalidEncoding,
    /// String field was not valid UTF-8
    InvalidUtf8,
}

impl From<encdec::Error> for ApduError {
    fn from(e: encdec::Error) -> Self {
        match e {
            encdec::Error::Length => ApduError::InvalidLength,
            _ => ApduError::InvalidEncoding,
        }
    }
}

/// Static APDU header information, implemented for each request type
pub trait ApduStatic {
    /// APDU class
    const CLA: u8;

    /// APDU instruction
    const INS: u8;

    /// First parameter byte, zero unless overridden
    fn p1(&self) -> u8 {
        0
    }

    /// Second parameter byte, zero unless overridden
    fn p2(&self) -> u8 {
        0
    }
}

/// APDU header as placed on the wire
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ApduHeader {
    pub cla: u8,
    pub ins: u8,
    pub p1: u8,
    pub p2: u8,
}

/// Request APDU, combining static header information with a payload encoding
pub trait ApduReq: encdec::Encode<Error = ApduError> + Debug {
    /// Fetch the header for this request
    fn header(&self) -> ApduHeader;
}

impl<T: ApduStatic + encdec::Encode<Error = ApduError> + Debug> ApduReq for T {
    fn header(&self) -> ApduHeader {
        ApduHeader {
            cla: T::CLA,
            ins: T::INS,
            p1: self.p1(),
            p2: self.p2(),
        }
    }
}

/// Helper macro for zero-length request APDUs
macro_rules! empty_apdu {
    ($t:ident, $ins:expr) => {
        impl $crate::ApduStatic for $t {
            const CLA: u8 = $crate::RKI_APDU_CLA;
            const INS: u8 = $ins as u8;
        }

        impl encdec::Encode for $t {
            type Error = $crate::ApduError;

            fn encode_len(&self) -> Result<usize, Self::Error> {
                Ok(0)
            }

            fn encode(&self, _buff: &mut [u8]) -> Result<usize, Self::Error> {
                Ok(0)
            }
        }

        impl encdec::DecodeOwned for $t {
            type Output = Self;
            type Error = $crate::ApduError;

            fn decode_owned(_buff: &[u8]) -> Result<(Self::Output, usize), Self::Error> {
                Ok((Self {}, 0))
            }
        }
    };
}
pub(crate) use empty_apdu;

#[cfg(test)]
pub(crate) mod test {
    use encdec::{DecodeOwned, Encode};

    use super::*;

    /// Helper for APDU encode / decode tests
    pub fn encode_decode_apdu<A>(buff: &mut [u8], apdu: &A) -> usize
    where
        A: Encode<Error = ApduError> + DecodeOwned<Output = A, Error = ApduError> + PartialEq + Debug,
    {
        // Encode APDU
        let n = apdu.encode(buff).expect("encode failed");

        // Check encoded length matches expected length
        let expected_n = apdu.encode_len().expect("get length failed");
        assert_eq!(n, expected_n, "encode length mismatch");

        // Decode APDU
        let (decoded, decoded_n) = A::decode_owned(&buff[..n]).expect("decode failed");

        // Check decoded object and length match
        assert_eq!(apdu, &decoded);
        assert_eq!(expected_n, decoded_n);

        n
    }
}
