// Copyright (c) 2022-2023 The MobileCoin Foundation

use encdec::DecodeOwned;
use log::debug;

use rki_apdu::{
    file::{FileReadReq, FileSelectReq, FileSelectResp},
    Interface,
};

use super::{ProgressGate, TransferOptions};
use crate::{transport::Channel, DeviceHandle, Error};

impl<T: Channel> DeviceHandle<T> {
    /// Download a terminal-resident file.
    ///
    /// The file is selected for reading then fetched using repeated reads of
    /// at most `opts.max_chunk` bytes. `progress` is called with the completed
    /// fraction (`0.0..=1.0`) each time `opts.granularity` bytes have been read.
    pub async fn download<P: FnMut(f32) + Send>(
        &self,
        interface: Interface,
        name: &str,
        opts: &TransferOptions,
        mut progress: P,
    ) -> Result<Vec<u8>, Error> {
        if opts.max_chunk == 0 {
            return Err(Error::InvalidArgument("chunk size must be non-zero"));
        }

        let total = self.select_read(interface, name).await?;

        debug!("Downloading '{}' ({} bytes)", name, total);

        let mut buff = vec![0u8; total];
        let mut offset = 0;
        let mut gate = ProgressGate::new(opts.granularity);

        while offset < total {
            let len = opts.max_chunk.min(total - offset);

            let req = FileReadReq::new(total as u32, offset as u32, len as u32);
            let r = self.exchange(interface, &req).await?;

            if !r.status_ok() || r.body.is_empty() {
                debug!(
                    "Read failed at offset {} (status: {}, {} bytes)",
                    offset,
                    r.status,
                    r.body.len()
                );
                return Err(Error::TransferFailed {
                    offset: offset as u64,
                });
            }

            // Chunks may be shorter than requested, never longer
            let n = r.body.len().min(len);
            buff[offset..][..n].copy_from_slice(&r.body[..n]);
            offset += n;

            if gate.advance(n) {
                progress(offset as f32 / total as f32);
            }
        }

        if gate.finish() {
            progress(1.0);
        }

        debug!("Download of '{}' complete", name);

        Ok(buff)
    }

    /// Select a file for reading, returning the file size
    async fn select_read(&self, interface: Interface, name: &str) -> Result<usize, Error> {
        let r = self.exchange(interface, &FileSelectReq::read(name)).await?;

        if !r.status_ok() {
            debug!("Select '{}' failed with status {}", name, r.status);
            return Err(Error::FileNotFound(name.to_string()));
        }

        let (resp, _) = FileSelectResp::decode_owned(&r.body)?;

        match resp.size {
            n if n < 0 => Err(Error::FileNotFound(name.to_string())),
            0 => Err(Error::EmptyFile(name.to_string())),
            n => Ok(n as usize),
        }
    }
}
