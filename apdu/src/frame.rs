// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Frame encoding for byte-stream transports (TCP, serial bridges)
//!
//! Each command is sent as a fixed request header followed by the APDU payload,
//! each response as a fixed response header followed by the response body.
//! Payload lengths are 32-bit to support large upload chunks.

use byteorder::{ByteOrder, LittleEndian as LE};

use crate::{helpers::check_len, ApduError, ApduHeader, Interface, StatusCode};

/// Maximum payload accepted in a single frame
pub const MAX_FRAME_PAYLOAD: usize = 1024 * 1024;

/// Request frame header
///
/// ## Encoding:
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |   INTERFACE   |      CLA      |      INS      |      P1       |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |      P2       |                    RESERVED                   |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                        PAYLOAD_LENGTH                         |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct RequestHeader {
    pub interface: Interface,
    pub apdu: ApduHeader,
    pub len: u32,
}

impl RequestHeader {
    /// Encoded request header length
    pub const LEN: usize = 12;

    pub fn encode(&self, buff: &mut [u8]) -> Result<usize, ApduError> {
        check_len(buff, Self::LEN)?;

        buff[0] = self.interface as u8;
        buff[1] = self.apdu.cla;
        buff[2] = self.apdu.ins;
        buff[3] = self.apdu.p1;
        buff[4] = self.apdu.p2;
        buff[5..8].copy_from_slice(&[0u8; 3]);
        LE::write_u32(&mut buff[8..12], self.len);

        Ok(Self::LEN)
    }

    pub fn decode(buff: &[u8]) -> Result<Self, ApduError> {
        check_len(buff, Self::LEN)?;

        let interface = Interface::try_from(buff[0]).map_err(|_| ApduError::InvalidEncoding)?;
        let len = LE::read_u32(&buff[8..12]);

        if len as usize > MAX_FRAME_PAYLOAD {
            return Err(ApduError::InvalidLength);
        }

        Ok(Self {
            interface,
            apdu: ApduHeader {
                cla: buff[1],
                ins: buff[2],
                p1: buff[3],
                p2: buff[4],
            },
            len,
        })
    }
}

/// Response frame header
///
/// ## Encoding:
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |            STATUS             |           RESERVED            |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                         BODY_LENGTH                           |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct ResponseHeader {
    pub status: StatusCode,
    pub len: u32,
}

impl ResponseHeader {
    /// Encoded response header length
    pub const LEN: usize = 8;

    pub fn encode(&self, buff: &mut [u8]) -> Result<usize, ApduError> {
        check_len(buff, Self::LEN)?;

        LE::write_u16(&mut buff[0..2], self.status.0);
        buff[2..4].copy_from_slice(&[0u8; 2]);
        LE::write_u32(&mut buff[4..8], self.len);

        Ok(Self::LEN)
    }

    pub fn decode(buff: &[u8]) -> Result<Self, ApduError> {
        check_len(buff, Self::LEN)?;

        let status = StatusCode(LE::read_u16(&buff[0..2]));
        let len = LE::read_u32(&buff[4..8]);

        if len as usize > MAX_FRAME_PAYLOAD {
            return Err(ApduError::InvalidLength);
        }

        Ok(Self { status, len })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::RKI_APDU_CLA;

    #[test]
    fn request_header_layout() {
        let h = RequestHeader {
            interface: Interface::Secondary,
            apdu: ApduHeader {
                cla: RKI_APDU_CLA,
                ins: 0x31,
                p1: 0x01,
                p2: 0x00,
            },
            len: 0x0102_0304,
        };

        let mut buff = [0u8; RequestHeader::LEN];
        h.encode(&mut buff).unwrap();

        assert_eq!(
            buff,
            [0x01, 0xd0, 0x31, 0x01, 0x00, 0, 0, 0, 0x04, 0x03, 0x02, 0x01]
        );
        assert_eq!(RequestHeader::decode(&buff), Err(ApduError::InvalidLength));
    }

    #[test]
    fn response_header_decode() {
        let h = ResponseHeader {
            status: StatusCode::FILE_NOT_FOUND,
            len: 0,
        };

        let mut buff = [0u8; ResponseHeader::LEN];
        h.encode(&mut buff).unwrap();

        assert_eq!(ResponseHeader::decode(&buff), Ok(h));
    }

    #[test]
    fn header_rejects_unknown_interface() {
        let mut buff = [0u8; RequestHeader::LEN];
        buff[0] = 0x07;

        assert_eq!(RequestHeader::decode(&buff), Err(ApduError::InvalidEncoding));
    }
}
