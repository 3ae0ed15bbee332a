//! Prelude to simplify downstream use of APDU objects
//!

pub use crate::{
    display::{DisplayFlags, DisplayReq},
    file::{FileReadReq, FileSelectReq, FileSelectResp, FileWriteReq, SelectMode},
    secure::{KeyImportReq, KeyImportResp, SecureFlags, SecureInitReq, SecureStateReq, SecureStateResp},
    ApduReq, Interface, StatusCode,
};
