// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Secure storage APDUs, used to drive key injection

use byteorder::{ByteOrder, LittleEndian as LE};
use encdec::{DecodeOwned, Encode};

use crate::{empty_apdu, helpers::check_len, ApduError, Instruction};

bitflags::bitflags! {
    /// Secure storage state flags
    #[derive(Default)]
    pub struct SecureFlags: u8 {
        /// Key injection mode is active, storage has been initialised
        const INITIALISED = 1 << 0;
        /// PIN encryption key is provisioned
        const PIN_KEY_READY = 1 << 1;
        /// SRED (card data) encryption key is provisioned
        const SRED_KEY_READY = 1 << 2;
    }
}

/// Initialise secure storage, entering key injection mode
#[derive(Copy, Clone, PartialEq, Debug, Default)]
pub struct SecureInitReq {}

empty_apdu!(SecureInitReq, Instruction::SecureInit);

/// Fetch secure storage state
#[derive(Copy, Clone, PartialEq, Debug, Default)]
pub struct SecureStateReq {}

empty_apdu!(SecureStateReq, Instruction::SecureState);

/// Secure storage state response
///
/// ## Encoding:
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |     FLAGS     |                    RESERVED                   |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct SecureStateResp {
    pub flags: SecureFlags,
}

impl SecureStateResp {
    pub fn new(flags: SecureFlags) -> Self {
        Self { flags }
    }
}

impl Encode for SecureStateResp {
    type Error = ApduError;

    fn encode_len(&self) -> Result<usize, Self::Error> {
        Ok(4)
    }

    fn encode(&self, buff: &mut [u8]) -> Result<usize, Self::Error> {
        check_len(buff, 4)?;

        buff[0] = self.flags.bits();
        buff[1..4].copy_from_slice(&[0u8; 3]);

        Ok(4)
    }
}

impl DecodeOwned for SecureStateResp {
    type Output = Self;
    type Error = ApduError;

    fn decode_owned(buff: &[u8]) -> Result<(Self::Output, usize), Self::Error> {
        // Older terminals return only the flag byte
        check_len(buff, 1)?;

        let flags = SecureFlags::from_bits_truncate(buff[0]);

        Ok((Self { flags }, buff.len().min(4)))
    }
}

/// Import uploaded key material into secure storage
#[derive(Copy, Clone, PartialEq, Debug, Default)]
pub struct KeyImportReq {}

empty_apdu!(KeyImportReq, Instruction::KeyImport);

/// Key import response, contains the terminal import error code
///
/// ## Encoding:
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |          ERROR_CODE           |           RESERVED            |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct KeyImportResp {
    pub code: u16,
}

impl KeyImportResp {
    /// Import completed without error
    pub const NO_ERROR: u16 = 0x0000;

    pub fn new(code: u16) -> Self {
        Self { code }
    }

    /// Check whether the import succeeded
    pub fn is_ok(&self) -> bool {
        self.code == Self::NO_ERROR
    }
}

impl Encode for KeyImportResp {
    type Error = ApduError;

    fn encode_len(&self) -> Result<usize, Self::Error> {
        Ok(4)
    }

    fn encode(&self, buff: &mut [u8]) -> Result<usize, Self::Error> {
        check_len(buff, 4)?;

        LE::write_u16(&mut buff[0..2], self.code);
        buff[2..4].copy_from_slice(&[0u8; 2]);

        Ok(4)
    }
}

impl DecodeOwned for KeyImportResp {
    type Output = Self;
    type Error = ApduError;

    fn decode_owned(buff: &[u8]) -> Result<(Self::Output, usize), Self::Error> {
        check_len(buff, 2)?;

        let code = LE::read_u16(&buff[0..2]);

        Ok((Self { code }, buff.len().min(4)))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test::encode_decode_apdu;

    #[test]
    fn secure_state_resp_apdu() {
        let apdu = SecureStateResp::new(SecureFlags::PIN_KEY_READY | SecureFlags::SRED_KEY_READY);

        let mut buff = [0u8; 8];
        encode_decode_apdu(&mut buff, &apdu);
    }

    #[test]
    fn secure_state_short_resp() {
        let (r, n) = SecureStateResp::decode_owned(&[0x01]).unwrap();

        assert_eq!(n, 1);
        assert!(r.flags.contains(SecureFlags::INITIALISED));
        assert!(!r.flags.intersects(SecureFlags::PIN_KEY_READY | SecureFlags::SRED_KEY_READY));
    }

    #[test]
    fn key_import_resp_apdu() {
        let mut buff = [0u8; 8];

        let apdu = KeyImportResp::new(0x0107);
        encode_decode_apdu(&mut buff, &apdu);
        assert!(!apdu.is_ok());

        assert!(KeyImportResp::new(KeyImportResp::NO_ERROR).is_ok());
    }
}
