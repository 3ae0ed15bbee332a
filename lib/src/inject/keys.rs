// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Bootstrap and derived key file definitions

use zeroize::Zeroizing;

use crate::{host::HostProvisioningResponse, Error};

/// Production signing certificate
pub const PROD_SIGN_CERT_FILE: &str = "prod_sign.crt";
/// Terminal certificate
pub const TERMINAL_CERT_FILE: &str = "terminal.crt";
/// Temporary load certificate
pub const TEMP_LOAD_CERT_FILE: &str = "temp_load.crt";
/// Suggested initial key serial number
pub const SUGGESTED_IKSN_FILE: &str = "iksn.txt";

/// Bootstrap files, downloaded in order before contacting the key host
pub const BOOTSTRAP_FILES: [&str; 4] = [
    PROD_SIGN_CERT_FILE,
    TERMINAL_CERT_FILE,
    TEMP_LOAD_CERT_FILE,
    SUGGESTED_IKSN_FILE,
];

pub const HSM_CERT_FILE: &str = "rki_hsm.crt";
pub const KBPK_FILE: &str = "rki_kbpk.bin";
pub const KBPK_SIG_FILE: &str = "rki_kbpk.sig";
pub const SRED_TR31_FILE: &str = "rki_sred.tr31";
pub const SRED_IKSN_FILE: &str = "rki_sred.iksn";
pub const PIN_TR31_FILE: &str = "rki_pin.tr31";
pub const PIN_IKSN_FILE: &str = "rki_pin.iksn";

/// Derived key files, uploaded in order
pub const KEY_FILES: [&str; 7] = [
    HSM_CERT_FILE,
    KBPK_FILE,
    KBPK_SIG_FILE,
    SRED_TR31_FILE,
    SRED_IKSN_FILE,
    PIN_TR31_FILE,
    PIN_IKSN_FILE,
];

/// Key file payload encoding
#[derive(Copy, Clone, Debug, PartialEq, strum::Display)]
pub enum KeyEncoding {
    /// Field text uploaded as UTF-8 bytes
    Text,
    /// Field hex decoded and uploaded as binary
    Hex,
}

/// Key material ready for upload to a fixed file name
pub struct DerivedKeyFile {
    pub name: &'static str,
    pub data: Zeroizing<Vec<u8>>,
}

impl core::fmt::Debug for DerivedKeyFile {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DerivedKeyFile")
            .field("name", &self.name)
            .field("len", &self.data.len())
            .finish()
    }
}

impl DerivedKeyFile {
    fn encode(name: &'static str, encoding: KeyEncoding, value: &str) -> Result<Self, Error> {
        let data = match encoding {
            KeyEncoding::Text => value.as_bytes().to_vec(),
            KeyEncoding::Hex => hex::decode(value)?,
        };

        Ok(Self {
            name,
            data: Zeroizing::new(data),
        })
    }
}

/// Build the ordered derived key files from a provisioning response.
///
/// All fields are decoded before returning so encoding errors are reported
/// before any upload begins. On failure the name of the offending file is
/// returned with the error.
pub fn derive_key_files(
    resp: &HostProvisioningResponse,
) -> Result<Vec<DerivedKeyFile>, (&'static str, Error)> {
    let fields = [
        (HSM_CERT_FILE, KeyEncoding::Text, &resp.hsm_cert),
        (KBPK_FILE, KeyEncoding::Hex, &resp.kbpk),
        (KBPK_SIG_FILE, KeyEncoding::Hex, &resp.kbpk_sig),
        (SRED_TR31_FILE, KeyEncoding::Text, &resp.sred_tr31),
        (SRED_IKSN_FILE, KeyEncoding::Text, &resp.sred_iksn),
        (PIN_TR31_FILE, KeyEncoding::Text, &resp.pin_tr31),
        (PIN_IKSN_FILE, KeyEncoding::Text, &resp.pin_iksn),
    ];

    fields
        .into_iter()
        .map(|(name, encoding, value)| {
            DerivedKeyFile::encode(name, encoding, value).map_err(|e| (name, e))
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    fn response() -> HostProvisioningResponse {
        HostProvisioningResponse {
            hsm_cert: "-----BEGIN CERTIFICATE-----".to_string(),
            kbpk: "00a1ff".to_string(),
            kbpk_sig: "DEADBEEF".to_string(),
            sred_tr31: "B0080P0TE00E0000".to_string(),
            sred_iksn: "FFFF9876543210E00000".to_string(),
            pin_tr31: "B0080P0TE00E0001".to_string(),
            pin_iksn: "FFFF9876543210E00001".to_string(),
        }
    }

    #[test]
    fn key_file_order_and_encoding() {
        let r = response();
        let files = derive_key_files(&r).unwrap();

        let names: Vec<_> = files.iter().map(|f| f.name).collect();
        assert_eq!(names, KEY_FILES);

        assert_eq!(&files[0].data[..], r.hsm_cert.as_bytes());
        assert_eq!(&files[1].data[..], &[0x00, 0xa1, 0xff]);
        assert_eq!(&files[2].data[..], &[0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(&files[3].data[..], r.sred_tr31.as_bytes());
        assert_eq!(&files[4].data[..], r.sred_iksn.as_bytes());
        assert_eq!(&files[5].data[..], r.pin_tr31.as_bytes());
        assert_eq!(&files[6].data[..], r.pin_iksn.as_bytes());
    }

    #[test]
    fn odd_length_hex_fails() {
        let mut r = response();
        r.kbpk_sig = "abc".to_string();

        let (name, e) = derive_key_files(&r).unwrap_err();

        assert_eq!(name, KBPK_SIG_FILE);
        assert!(
            matches!(e, Error::HexDecode(hex::FromHexError::OddLength)),
            "{e:?}"
        );
    }

    #[test]
    fn text_fields_are_not_hex_decoded() {
        let mut r = response();
        r.sred_iksn = "not hex".to_string();

        assert!(derive_key_files(&r).is_ok());
    }
}
