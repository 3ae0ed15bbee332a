// Copyright (c) 2022-2023 The MobileCoin Foundation

use crate::ApduError;

/// Check a buffer can hold (or contains) at least `n` bytes
#[inline]
pub(crate) fn check_len(buff: &[u8], n: usize) -> Result<(), ApduError> {
    match buff.len() < n {
        true => Err(ApduError::InvalidLength),
        false => Ok(()),
    }
}

/// encdec helper module for strings with an externally encoded length
pub(crate) mod text {
    use super::check_len;
    use crate::ApduError;

    pub fn enc(s: &str, buff: &mut [u8]) -> Result<usize, ApduError> {
        let d = s.as_bytes();
        check_len(buff, d.len())?;

        buff[..d.len()].copy_from_slice(d);

        Ok(d.len())
    }

    pub fn dec(buff: &[u8], len: usize) -> Result<(&str, usize), ApduError> {
        check_len(buff, len)?;

        let s = core::str::from_utf8(&buff[..len]).map_err(|_| ApduError::InvalidUtf8)?;

        Ok((s, len))
    }
}
