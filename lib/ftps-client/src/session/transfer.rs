/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::io;

use log::{debug, warn};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use super::SessionInner;
use crate::connection::FtpsConnectionProvider;
use crate::control::{FtpCommand, FtpTransferStart};
use crate::error::FtpsError;
use crate::transfer::{FtpDataStream, connect_data};

enum DataChannel<S> {
    /// the server completed the command without using the data connection
    Unused,
    /// the server closed the data connection before the tls handshake
    ClosedEarly,
    Open(FtpDataStream<S>),
}

impl<P: FtpsConnectionProvider> SessionInner<P> {
    /// Set up the data connection and send `cmd`.
    async fn start_data_transfer(
        &mut self,
        cmd: FtpCommand,
        path: Option<&str>,
    ) -> Result<DataChannel<P::Stream>, FtpsError> {
        let endpoint = self.passive.request_endpoint(&mut self.control).await?;
        let stream = connect_data(&mut self.provider, &endpoint, self.config.connect_timeout).await?;

        match self.control.start_transfer(cmd, path).await? {
            FtpTransferStart::Completed(reply) => {
                debug!("{cmd} completed without data: {reply}");
                Ok(DataChannel::Unused)
            }
            FtpTransferStart::Proceed => {
                match FtpDataStream::establish(stream, self.tls.as_ref(), &self.config.transfer)
                    .await
                {
                    Ok(Some(data)) => Ok(DataChannel::Open(data)),
                    Ok(None) => Ok(DataChannel::ClosedEarly),
                    Err(e) => self.finish_transfer(cmd, Err(e), false).await,
                }
            }
        }
    }

    /// Read the completion reply of `cmd`, whatever happened on the data connection.
    ///
    /// The data connection must already be closed. A data error takes
    /// precedence over the completion reply.
    async fn finish_transfer<T>(
        &mut self,
        cmd: FtpCommand,
        data: Result<T, FtpsError>,
        close_notify_missing: bool,
    ) -> Result<T, FtpsError> {
        let end = self
            .control
            .wait_transfer_end(cmd, self.config.transfer.end_wait_timeout)
            .await;
        match (data, end) {
            (Ok(v), Ok(reply)) => {
                if close_notify_missing && !matches!(reply.code(), 226 | 250) {
                    return Err(FtpsError::tls(
                        "receiving data",
                        io::Error::new(
                            io::ErrorKind::UnexpectedEof,
                            format!("data connection closed without close_notify, {cmd} ended with {reply}"),
                        ),
                    ));
                }
                debug!("{cmd} completed: {reply}");
                Ok(v)
            }
            (Ok(_), Err(e)) => Err(e),
            (Err(e), Ok(reply)) => {
                debug!("{cmd} failed locally while server replied {reply}");
                Err(e)
            }
            (Err(e), Err(end_e)) => {
                warn!("failed to get the completion reply of {cmd}: {end_e}");
                Err(e)
            }
        }
    }

    async fn close_data(data: FtpDataStream<P::Stream>) {
        if let Err(e) = data.finish().await {
            debug!("failed to shutdown data connection: {e}");
        }
    }

    pub(super) async fn list(&mut self, path: Option<&str>) -> Result<Vec<u8>, FtpsError> {
        let cmd = FtpCommand::LIST;
        let mut data = match self.start_data_transfer(cmd, path).await? {
            DataChannel::Open(data) => data,
            DataChannel::Unused => return Ok(Vec::new()),
            DataChannel::ClosedEarly => return self.finish_transfer(cmd, Ok(Vec::new()), true).await,
        };

        let r = data.receive_all(self.config.transfer.list_max_size).await;
        let close_notify_missing = data.close_notify_missing();
        if r.is_ok() {
            Self::close_data(data).await;
        } else {
            drop(data);
        }
        let content = self.finish_transfer(cmd, r, close_notify_missing).await?;
        debug!("received {} bytes of listing", content.len());
        Ok(content)
    }

    pub(super) async fn retrieve<W>(&mut self, path: &str, sink: &mut W) -> Result<u64, FtpsError>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let cmd = FtpCommand::RETR;
        let mut data = match self.start_data_transfer(cmd, Some(path)).await? {
            DataChannel::Open(data) => data,
            DataChannel::Unused => return Ok(0),
            DataChannel::ClosedEarly => return self.finish_transfer(cmd, Ok(0), true).await,
        };

        let r = match data.receive_to(sink).await {
            Ok(n) => sink
                .flush()
                .await
                .map(|_| n)
                .map_err(|e| FtpsError::network("flushing download sink", e)),
            Err(e) => Err(e),
        };
        let close_notify_missing = data.close_notify_missing();
        if r.is_ok() {
            Self::close_data(data).await;
        } else {
            drop(data);
        }
        let n = self.finish_transfer(cmd, r, close_notify_missing).await?;
        debug!("downloaded {n} bytes from {path}");
        Ok(n)
    }

    pub(super) async fn store<R>(&mut self, path: &str, source: &mut R) -> Result<u64, FtpsError>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let cmd = FtpCommand::STOR;
        let mut data = match self.start_data_transfer(cmd, Some(path)).await? {
            DataChannel::Open(data) => data,
            DataChannel::Unused => return Ok(0),
            DataChannel::ClosedEarly => {
                let e = FtpsError::tls(
                    "data connection handshake",
                    io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "data connection closed before tls handshake",
                    ),
                );
                return self.finish_transfer(cmd, Err(e), false).await;
            }
        };

        // the server only sees the end of file once the data connection is shut down
        let r = match data.send_from(source).await {
            Ok(n) => data.finish().await.map(|_| n),
            Err(e) => {
                self.provider.abort_data_connection(data.transport());
                drop(data);
                Err(e)
            }
        };
        let n = self.finish_transfer(cmd, r, false).await?;
        debug!("uploaded {n} bytes to {path}");
        Ok(n)
    }
}
