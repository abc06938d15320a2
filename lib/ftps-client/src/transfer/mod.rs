/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::io;
use std::time::Duration;

use log::debug;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::config::FtpsTransferConfig;
use crate::error::{FtpProtocolError, FtpsError};
use crate::stream::MaybeTlsStream;
use crate::tls::FtpsTlsConnector;

mod passive;
pub(crate) use passive::{FtpPassiveMode, connect_data};

/// One data connection, good for a single transfer.
pub struct FtpDataStream<S> {
    stream: MaybeTlsStream<S>,
    buffer_size: usize,
    idle_timeout: Duration,
    used: bool,
    transferred: u64,
    close_notify_missing: bool,
}

impl<S> FtpDataStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: MaybeTlsStream<S>, config: &FtpsTransferConfig) -> Self {
        FtpDataStream {
            stream,
            buffer_size: config.buffer_size,
            idle_timeout: config.idle_timeout,
            used: false,
            transferred: 0,
            close_notify_missing: false,
        }
    }

    /// Wrap the connected transport, running the TLS handshake if the control channel is encrypted.
    ///
    /// `None` if the server closed the connection before the TLS handshake.
    pub(crate) async fn establish(
        stream: S,
        tls: Option<&FtpsTlsConnector>,
        config: &FtpsTransferConfig,
    ) -> Result<Option<Self>, FtpsError> {
        let stream = match tls {
            Some(connector) => {
                let Some(tls_stream) = connector
                    .connect_data(stream, "data connection handshake")
                    .await?
                else {
                    debug!("data connection closed before tls handshake");
                    return Ok(None);
                };
                let stream = MaybeTlsStream::from(tls_stream);
                debug!(
                    "data connection tls established, session reused: {}",
                    stream.session_reused()
                );
                stream
            }
            None => MaybeTlsStream::Plain(stream),
        };
        Ok(Some(FtpDataStream::new(stream, config)))
    }

    /// The underlying transport, below TLS.
    #[inline]
    pub fn transport(&self) -> &S {
        self.stream.get_ref()
    }

    #[inline]
    pub fn is_tls(&self) -> bool {
        self.stream.is_tls()
    }

    #[inline]
    pub fn transferred(&self) -> u64 {
        self.transferred
    }

    /// Whether the peer closed the TLS data connection without close_notify.
    #[inline]
    pub fn close_notify_missing(&self) -> bool {
        self.close_notify_missing
    }

    fn begin(&mut self) -> Result<(), FtpsError> {
        if self.used {
            return Err(FtpProtocolError::DataStreamReused.into());
        }
        self.used = true;
        Ok(())
    }

    async fn read_some(&mut self, buf: &mut [u8]) -> Result<usize, FtpsError> {
        match tokio::time::timeout(self.idle_timeout, self.stream.read(buf)).await {
            Ok(Ok(n)) => Ok(n),
            Ok(Err(e)) if e.kind() == io::ErrorKind::UnexpectedEof && self.stream.is_tls() => {
                self.close_notify_missing = true;
                Ok(0)
            }
            Ok(Err(e)) => Err(FtpsError::network("receiving data", e)),
            Err(_) => Err(FtpsError::timed_out("receiving data")),
        }
    }

    /// Copy everything received into `sink`, returning the byte count.
    pub async fn receive_to<W>(&mut self, sink: &mut W) -> Result<u64, FtpsError>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        self.begin()?;

        let mut buf = vec![0u8; self.buffer_size];
        loop {
            let n = self.read_some(&mut buf).await?;
            if n == 0 {
                return Ok(self.transferred);
            }
            sink.write_all(&buf[..n])
                .await
                .map_err(|e| FtpsError::network("writing received data", e))?;
            self.transferred += n as u64;
        }
    }

    /// Read the whole content, failing if it grows beyond `max_size`.
    pub async fn receive_all(&mut self, max_size: usize) -> Result<Vec<u8>, FtpsError> {
        self.begin()?;

        let mut data = Vec::new();
        let mut buf = vec![0u8; self.buffer_size];
        loop {
            let n = self.read_some(&mut buf).await?;
            if n == 0 {
                return Ok(data);
            }
            if data.len() + n > max_size {
                return Err(FtpProtocolError::ListingTooLarge(max_size).into());
            }
            data.extend_from_slice(&buf[..n]);
            self.transferred += n as u64;
        }
    }

    /// Copy `source` to the server until it is exhausted, returning the byte count.
    pub async fn send_from<R>(&mut self, source: &mut R) -> Result<u64, FtpsError>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        self.begin()?;

        let mut buf = vec![0u8; self.buffer_size];
        loop {
            let n = source
                .read(&mut buf)
                .await
                .map_err(|e| FtpsError::network("reading upload source", e))?;
            if n == 0 {
                return Ok(self.transferred);
            }
            match tokio::time::timeout(self.idle_timeout, self.stream.write_all(&buf[..n])).await
            {
                Ok(Ok(_)) => self.transferred += n as u64,
                Ok(Err(e)) => return Err(FtpsError::network("sending data", e)),
                Err(_) => return Err(FtpsError::timed_out("sending data")),
            }
        }
    }

    /// Flush and shut down the connection, sending close_notify on TLS.
    pub async fn finish(mut self) -> Result<(), FtpsError> {
        match tokio::time::timeout(self.idle_timeout, self.stream.shutdown()).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(FtpsError::network("closing data connection", e)),
            Err(_) => Err(FtpsError::timed_out("closing data connection")),
        }
    }
}
