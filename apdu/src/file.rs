// Copyright (c) 2022-2023 The MobileCoin Foundation

//! File transfer APDUs
//!
//! Files are selected by name with [FileSelectReq], then read with
//! repeated [FileReadReq]s or written with repeated [FileWriteReq]s.
//! Only one file may be selected per interface at a time.

use byteorder::{ByteOrder, LittleEndian as LE};
use encdec::{Decode, DecodeOwned, Encode};
use num_enum::TryFromPrimitive;

use crate::{
    helpers::{check_len, text},
    ApduError, ApduStatic, Instruction, RKI_APDU_CLA,
};

/// Maximum file name length in bytes
pub const MAX_FILE_NAME: usize = 32;

/// File select mode
#[derive(Copy, Clone, PartialEq, Debug, TryFromPrimitive, strum::Display)]
#[repr(u8)]
pub enum SelectMode {
    /// Open an existing file for reading (append / read), returning its size
    Read = 0x00,
    /// Create or truncate a file for writing
    Truncate = 0x01,
}

/// Select a file for subsequent read or write operations
///
/// ## Encoding:
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |     MODE      |   NAME_LEN    |           RESERVED            |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// /                          NAME (UTF-8)                         /
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
#[derive(Clone, PartialEq, Debug)]
pub struct FileSelectReq<'a> {
    /// Select mode
    pub mode: SelectMode,
    /// File name
    pub name: &'a str,
}

impl<'a> FileSelectReq<'a> {
    /// Select an existing file for reading
    pub fn read(name: &'a str) -> Self {
        Self {
            mode: SelectMode::Read,
            name,
        }
    }

    /// Create or truncate a file for writing
    pub fn truncate(name: &'a str) -> Self {
        Self {
            mode: SelectMode::Truncate,
            name,
        }
    }
}

impl<'a> ApduStatic for FileSelectReq<'a> {
    const CLA: u8 = RKI_APDU_CLA;
    const INS: u8 = Instruction::FileSelect as u8;

    fn p1(&self) -> u8 {
        self.mode as u8
    }
}

impl<'a> Encode for FileSelectReq<'a> {
    type Error = ApduError;

    fn encode_len(&self) -> Result<usize, Self::Error> {
        Ok(4 + self.name.len())
    }

    fn encode(&self, buff: &mut [u8]) -> Result<usize, Self::Error> {
        if self.name.is_empty() || self.name.len() > MAX_FILE_NAME {
            return Err(ApduError::InvalidLength);
        }
        check_len(buff, 4)?;

        buff[0] = self.mode as u8;
        buff[1] = self.name.len() as u8;
        buff[2..4].copy_from_slice(&[0u8; 2]);

        let n = text::enc(self.name, &mut buff[4..])?;

        Ok(4 + n)
    }
}

impl<'a> Decode<'a> for FileSelectReq<'a> {
    type Output = Self;
    type Error = ApduError;

    fn decode(buff: &'a [u8]) -> Result<(Self, usize), ApduError> {
        check_len(buff, 4)?;

        let mode = SelectMode::try_from(buff[0]).map_err(|_| ApduError::InvalidEncoding)?;
        let len = buff[1] as usize;

        let (name, n) = text::dec(&buff[4..], len)?;

        Ok((Self { mode, name }, 4 + n))
    }
}

/// File select response APDU
///
/// Contains the selected file size for [SelectMode::Read], zero for a
/// truncated file, or a negative value where the select failed.
///
/// ## Encoding:
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                        SIZE (signed)                          |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct FileSelectResp {
    /// File size, or a negative failure sentinel
    pub size: i32,
}

impl FileSelectResp {
    pub fn new(size: i32) -> Self {
        Self { size }
    }
}

impl Encode for FileSelectResp {
    type Error = ApduError;

    fn encode_len(&self) -> Result<usize, Self::Error> {
        Ok(4)
    }

    fn encode(&self, buff: &mut [u8]) -> Result<usize, Self::Error> {
        check_len(buff, 4)?;
        LE::write_i32(&mut buff[..4], self.size);
        Ok(4)
    }
}

impl DecodeOwned for FileSelectResp {
    type Output = Self;
    type Error = ApduError;

    fn decode_owned(buff: &[u8]) -> Result<(Self::Output, usize), Self::Error> {
        check_len(buff, 4)?;
        let size = LE::read_i32(&buff[..4]);
        Ok((Self { size }, 4))
    }
}

/// Read a chunk from the currently selected file.
///
/// The response body contains the raw file data, which may be shorter
/// than the requested length.
///
/// ## Encoding:
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                          TOTAL_SIZE                           |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                            OFFSET                             |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                            LENGTH                             |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct FileReadReq {
    /// Total file size (as returned by select)
    pub total: u32,
    /// Offset to read from
    pub offset: u32,
    /// Requested chunk length
    pub len: u32,
}

impl FileReadReq {
    pub fn new(total: u32, offset: u32, len: u32) -> Self {
        Self { total, offset, len }
    }
}

impl ApduStatic for FileReadReq {
    const CLA: u8 = RKI_APDU_CLA;
    const INS: u8 = Instruction::FileRead as u8;
}

impl Encode for FileReadReq {
    type Error = ApduError;

    fn encode_len(&self) -> Result<usize, Self::Error> {
        Ok(12)
    }

    fn encode(&self, buff: &mut [u8]) -> Result<usize, Self::Error> {
        check_len(buff, 12)?;

        LE::write_u32(&mut buff[0..4], self.total);
        LE::write_u32(&mut buff[4..8], self.offset);
        LE::write_u32(&mut buff[8..12], self.len);

        Ok(12)
    }
}

impl DecodeOwned for FileReadReq {
    type Output = Self;
    type Error = ApduError;

    fn decode_owned(buff: &[u8]) -> Result<(Self::Output, usize), Self::Error> {
        check_len(buff, 12)?;

        Ok((
            Self {
                total: LE::read_u32(&buff[0..4]),
                offset: LE::read_u32(&buff[4..8]),
                len: LE::read_u32(&buff[8..12]),
            },
            12,
        ))
    }
}

/// Write a chunk to the currently selected file
///
/// ## Encoding:
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                            OFFSET                             |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |           DELAY_MS            |           RESERVED            |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// /                      DATA (to end of frame)                   /
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
#[derive(Clone, PartialEq, Debug)]
pub struct FileWriteReq<'a> {
    /// Offset in the selected file
    pub offset: u32,
    /// Pacing hint, the terminal waits this long after committing the chunk
    pub delay_ms: u16,
    /// Chunk data
    pub data: &'a [u8],
}

impl<'a> FileWriteReq<'a> {
    pub fn new(offset: u32, delay_ms: u16, data: &'a [u8]) -> Self {
        Self {
            offset,
            delay_ms,
            data,
        }
    }
}

impl<'a> ApduStatic for FileWriteReq<'a> {
    const CLA: u8 = RKI_APDU_CLA;
    const INS: u8 = Instruction::FileWrite as u8;
}

impl<'a> Encode for FileWriteReq<'a> {
    type Error = ApduError;

    fn encode_len(&self) -> Result<usize, Self::Error> {
        Ok(8 + self.data.len())
    }

    fn encode(&self, buff: &mut [u8]) -> Result<usize, Self::Error> {
        check_len(buff, 8 + self.data.len())?;

        LE::write_u32(&mut buff[0..4], self.offset);
        LE::write_u16(&mut buff[4..6], self.delay_ms);
        buff[6..8].copy_from_slice(&[0u8; 2]);
        buff[8..][..self.data.len()].copy_from_slice(self.data);

        Ok(8 + self.data.len())
    }
}

impl<'a> Decode<'a> for FileWriteReq<'a> {
    type Output = Self;
    type Error = ApduError;

    fn decode(buff: &'a [u8]) -> Result<(Self, usize), ApduError> {
        check_len(buff, 8)?;

        let offset = LE::read_u32(&buff[0..4]);
        let delay_ms = LE::read_u16(&buff[4..6]);
        let data = &buff[8..];

        Ok((
            Self {
                offset,
                delay_ms,
                data,
            },
            buff.len(),
        ))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test::encode_decode_apdu;

    #[test]
    fn file_select_req_apdu() {
        let apdu = FileSelectReq::truncate("rki_kbpk.bin");

        let mut buff = [0u8; 64];
        let n = apdu.encode(&mut buff).unwrap();

        let (decoded, decoded_n) = FileSelectReq::decode(&buff[..n]).unwrap();
        assert_eq!(decoded, apdu);
        assert_eq!(decoded_n, n);
        assert_eq!(apdu.p1(), SelectMode::Truncate as u8);
    }

    #[test]
    fn file_select_rejects_bad_names() {
        let mut buff = [0u8; 128];

        assert_eq!(
            FileSelectReq::read("").encode(&mut buff),
            Err(ApduError::InvalidLength)
        );

        let long = core::str::from_utf8(&[b'f'; MAX_FILE_NAME + 1]).unwrap();
        assert_eq!(
            FileSelectReq::read(long).encode(&mut buff),
            Err(ApduError::InvalidLength)
        );
    }

    #[test]
    fn file_select_resp_negative_size() {
        let mut buff = [0u8; 8];
        encode_decode_apdu(&mut buff, &FileSelectResp::new(-1));
    }

    #[test]
    fn file_read_req_apdu() {
        let apdu = FileReadReq::new(rand::random(), rand::random(), 252);

        let mut buff = [0u8; 16];
        assert_eq!(encode_decode_apdu(&mut buff, &apdu), 12);
    }

    #[test]
    fn file_write_req_apdu() {
        let data = [0xa5u8; 100];
        let apdu = FileWriteReq::new(1024, 5, &data);

        let mut buff = [0u8; 128];
        let n = apdu.encode(&mut buff).unwrap();
        assert_eq!(n, 108);

        let (decoded, _) = FileWriteReq::decode(&buff[..n]).unwrap();
        assert_eq!(decoded, apdu);
    }
}
