// Copyright (c) 2022-2023 The MobileCoin Foundation

use encdec::DecodeOwned;
use log::{debug, warn};
use tokio::io::{AsyncRead, AsyncReadExt};

use rki_apdu::{
    file::{FileSelectReq, FileSelectResp, FileWriteReq},
    Interface,
};

use super::{ProgressGate, TransferOptions};
use crate::{transport::Channel, DeviceHandle, Error};

/// Upload data source
pub enum UploadSource<'a> {
    /// In-memory buffer, `len` bytes from `offset` are uploaded
    Buffer {
        data: &'a [u8],
        offset: usize,
        len: usize,
    },
    /// Byte stream of unknown length, read until end-of-stream.
    /// The stream is dropped (closed) when the upload completes or fails.
    Stream(Box<dyn AsyncRead + Unpin + Send + 'a>),
}

impl<'a> UploadSource<'a> {
    /// Upload the whole of the provided buffer
    pub fn from_slice(data: &'a [u8]) -> Self {
        Self::Buffer {
            data,
            offset: 0,
            len: data.len(),
        }
    }

    /// Upload from a byte stream
    pub fn from_reader(r: impl AsyncRead + Unpin + Send + 'a) -> Self {
        Self::Stream(Box::new(r))
    }
}

impl<'a> From<&'a [u8]> for UploadSource<'a> {
    fn from(data: &'a [u8]) -> Self {
        Self::from_slice(data)
    }
}

impl<T: Channel> DeviceHandle<T> {
    /// Upload data to a terminal-resident file.
    ///
    /// The file is created / truncated then written using repeated writes of
    /// at most `opts.max_chunk` bytes. `progress` is called with the total
    /// bytes sent each time `opts.granularity` bytes have been written.
    ///
    /// Uploads are all-or-nothing, the first failed write aborts with
    /// [Error::TransferFailed]. Returns the number of bytes written.
    pub async fn upload<P: FnMut(u64) + Send>(
        &self,
        interface: Interface,
        name: &str,
        source: UploadSource<'_>,
        opts: &TransferOptions,
        mut progress: P,
    ) -> Result<u64, Error> {
        if opts.max_chunk == 0 {
            return Err(Error::InvalidArgument("chunk size must be non-zero"));
        }

        if let UploadSource::Buffer { data, offset, len } = &source {
            if offset.checked_add(*len).map(|end| end > data.len()) != Some(false) {
                return Err(Error::InvalidArgument("buffer range out of bounds"));
            }
        }

        self.select_truncate(interface, name).await?;

        let mut gate = ProgressGate::new(opts.granularity);

        let sent = match source {
            UploadSource::Buffer { data, offset, len } => {
                debug!("Uploading '{}' ({} bytes)", name, len);

                let mut sent = 0;
                for chunk in data[offset..][..len].chunks(opts.max_chunk) {
                    self.write_chunk(interface, sent, chunk, opts.delay_ms)
                        .await?;

                    sent += chunk.len() as u64;
                    if gate.advance(chunk.len()) {
                        progress(sent);
                    }
                }

                sent
            }
            UploadSource::Stream(mut stream) => {
                debug!("Uploading '{}' from stream", name);

                let mut buff = vec![0u8; opts.max_chunk];
                let mut sent = 0;

                loop {
                    let n = match fill(&mut stream, &mut buff).await {
                        Ok(0) => break,
                        Ok(n) => n,
                        Err(e) => {
                            warn!("Stream read failed after {} bytes: {}", sent, e);
                            drop(stream);
                            return Err(Error::LocalIo(e));
                        }
                    };

                    self.write_chunk(interface, sent, &buff[..n], opts.delay_ms)
                        .await?;

                    sent += n as u64;
                    if gate.advance(n) {
                        progress(sent);
                    }
                }

                drop(stream);

                sent
            }
        };

        if gate.finish() {
            progress(sent);
        }

        debug!("Upload of '{}' complete ({} bytes)", name, sent);

        Ok(sent)
    }

    /// Select a file for writing, truncating any existing content
    async fn select_truncate(&self, interface: Interface, name: &str) -> Result<(), Error> {
        let r = self
            .exchange(interface, &FileSelectReq::truncate(name))
            .await?;

        if !r.status_ok() {
            debug!("Select '{}' failed with status {}", name, r.status);
            return Err(Error::FileCreateFailed(name.to_string()));
        }

        let (resp, _) = FileSelectResp::decode_owned(&r.body)?;
        if resp.size < 0 {
            return Err(Error::FileCreateFailed(name.to_string()));
        }

        Ok(())
    }

    /// Write a single chunk at the provided offset
    async fn write_chunk(
        &self,
        interface: Interface,
        offset: u64,
        data: &[u8],
        delay_ms: u16,
    ) -> Result<(), Error> {
        let o = u32::try_from(offset).map_err(|_| Error::InvalidArgument("file too large"))?;

        let r = self
            .exchange(interface, &FileWriteReq::new(o, delay_ms, data))
            .await?;

        if !r.status_ok() {
            debug!("Write failed at offset {} (status: {})", offset, r.status);
            return Err(Error::TransferFailed { offset });
        }

        Ok(())
    }
}

/// Read from a stream until the buffer is full or the stream ends
async fn fill<R: AsyncRead + Unpin + ?Sized>(
    r: &mut R,
    buff: &mut [u8],
) -> Result<usize, std::io::Error> {
    let mut n = 0;

    while n < buff.len() {
        match r.read(&mut buff[n..]).await? {
            0 => break,
            v => n += v,
        }
    }

    Ok(n)
}
