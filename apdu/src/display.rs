// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Display APDUs, used to prompt the operator during long running operations

use encdec::{Decode, Encode};

use crate::{
    helpers::{check_len, text},
    ApduError, ApduStatic, Instruction, RKI_APDU_CLA,
};

/// Maximum display text length in bytes
pub const MAX_DISPLAY_TEXT: usize = 64;

bitflags::bitflags! {
    /// Display request flags
    pub struct DisplayFlags: u8 {
        /// Clear the display before writing the line
        const CLEAR = 1 << 0;
        /// Centre the text on the line
        const CENTRE = 1 << 1;
    }
}

/// Write a line of text to the terminal display
///
/// ## Encoding:
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |     LINE      |     FLAGS     |   TEXT_LEN    |   RESERVED    |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// /                          TEXT (UTF-8)                         /
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
#[derive(Clone, PartialEq, Debug)]
pub struct DisplayReq<'a> {
    /// Display line index
    pub line: u8,
    /// Display flags
    pub flags: DisplayFlags,
    /// Text to display
    pub text: &'a str,
}

impl<'a> DisplayReq<'a> {
    /// Create a display request clearing the screen and writing `text` on the first line
    pub fn new(text: &'a str) -> Self {
        Self {
            line: 0,
            flags: DisplayFlags::CLEAR | DisplayFlags::CENTRE,
            text,
        }
    }

    /// Create a display request writing `text` on the provided line without clearing
    pub fn line(line: u8, text: &'a str) -> Self {
        Self {
            line,
            flags: DisplayFlags::empty(),
            text,
        }
    }
}

impl<'a> ApduStatic for DisplayReq<'a> {
    const CLA: u8 = RKI_APDU_CLA;
    const INS: u8 = Instruction::Display as u8;

    fn p1(&self) -> u8 {
        self.line
    }
}

impl<'a> Encode for DisplayReq<'a> {
    type Error = ApduError;

    fn encode_len(&self) -> Result<usize, Self::Error> {
        Ok(4 + self.text.len())
    }

    fn encode(&self, buff: &mut [u8]) -> Result<usize, Self::Error> {
        if self.text.len() > MAX_DISPLAY_TEXT {
            return Err(ApduError::InvalidLength);
        }
        check_len(buff, 4)?;

        buff[0] = self.line;
        buff[1] = self.flags.bits();
        buff[2] = self.text.len() as u8;
        buff[3] = 0;

        let n = text::enc(self.text, &mut buff[4..])?;

        Ok(4 + n)
    }
}

impl<'a> Decode<'a> for DisplayReq<'a> {
    type Output = Self;
    type Error = ApduError;

    fn decode(buff: &'a [u8]) -> Result<(Self, usize), ApduError> {
        check_len(buff, 4)?;

        let line = buff[0];
        let flags = DisplayFlags::from_bits_truncate(buff[1]);
        let len = buff[2] as usize;

        let (text, n) = text::dec(&buff[4..], len)?;

        Ok((Self { line, flags, text }, 4 + n))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn display_req_apdu() {
        let apdu = DisplayReq::new("Preparing...");

        let mut buff = [0u8; 128];
        let n = apdu.encode(&mut buff).unwrap();
        assert_eq!(n, apdu.encode_len().unwrap());

        let (decoded, decoded_n) = DisplayReq::decode(&buff[..n]).unwrap();
        assert_eq!(decoded, apdu);
        assert_eq!(decoded_n, n);
    }

    #[test]
    fn display_req_too_long() {
        let s = core::str::from_utf8(&[b'a'; MAX_DISPLAY_TEXT + 1]).unwrap();
        let apdu = DisplayReq::new(s);

        let mut buff = [0u8; 128];
        assert_eq!(apdu.encode(&mut buff), Err(ApduError::InvalidLength));
    }
}
