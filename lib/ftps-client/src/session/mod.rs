/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use log::{debug, warn};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::sync::CancellationToken;

use crate::config::FtpsClientConfig;
use crate::connection::{FtpsConnectionProvider, TcpConnectionProvider};
use crate::control::FtpControlChannel;
use crate::error::{FtpProtocolError, FtpsError};
use crate::listing::{ListEntry, parse_listing};
use crate::options::DialOptions;
use crate::path;
use crate::tls::FtpsTlsConnector;
use crate::transfer::FtpPassiveMode;

mod dial;
mod transfer;

macro_rules! cancellable {
    ($token:expr, $fut:expr) => {
        tokio::select! {
            biased;
            _ = $token.cancelled() => Err(FtpsError::Cancelled),
            r = $fut => r,
        }
    };
}

/// Live state of an open session, dropped as a whole when the session ends.
pub(super) struct SessionInner<P: FtpsConnectionProvider> {
    config: FtpsClientConfig,
    provider: P,
    control: FtpControlChannel<P::Stream>,
    tls: Option<FtpsTlsConnector>,
    passive: FtpPassiveMode,
}

impl<P: FtpsConnectionProvider> SessionInner<P> {
    /// Returns the working directory the server reports after the change.
    async fn change_directory(&mut self, path: &str) -> Result<String, FtpsError> {
        self.control.change_working_directory(path).await?;
        match self.control.print_working_directory().await? {
            Some(cwd) => Ok(cwd),
            None => Ok(path.to_string()),
        }
    }
}

/// An authenticated FTP session over one control connection.
///
/// Operations take `&mut self` as the control connection is strictly serial.
/// Each of them may be interrupted with the given cancellation token, which
/// also closes the session.
pub struct FtpsSession<P: FtpsConnectionProvider = TcpConnectionProvider> {
    inner: Option<SessionInner<P>>,
    /// set while an operation is running, still set if its future was dropped
    busy: bool,
    cwd: String,
    greeting: String,
    encrypted: bool,
}

impl FtpsSession<TcpConnectionProvider> {
    /// Connect over TCP, secure the control connection and log in.
    pub async fn dial(options: &DialOptions, token: &CancellationToken) -> Result<Self, FtpsError> {
        let provider = TcpConnectionProvider::new(options.bind_ip);
        FtpsSession::dial_with_provider(options, provider, token).await
    }
}

impl<P: FtpsConnectionProvider> FtpsSession<P> {
    pub async fn dial_with_provider(
        options: &DialOptions,
        provider: P,
        token: &CancellationToken,
    ) -> Result<Self, FtpsError> {
        let tls = options.validate()?;
        cancellable!(token, dial::open_session(options, provider, tls))
    }

    /// The last known working directory.
    #[inline]
    pub fn current_directory(&self) -> &str {
        &self.cwd
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.inner.is_none()
    }

    #[inline]
    pub fn is_encrypted(&self) -> bool {
        self.encrypted
    }

    /// Text of the server greeting.
    #[inline]
    pub fn greeting(&self) -> &str {
        &self.greeting
    }

    fn resolve(&self, path: &str) -> String {
        path::resolve(&self.cwd, path)
    }

    fn begin(&mut self) -> Result<&mut SessionInner<P>, FtpsError> {
        if self.busy {
            self.busy = false;
            if self.inner.take().is_some() {
                warn!("a previous operation was interrupted, dropping the control connection");
                return Err(FtpProtocolError::Desynchronized.into());
            }
        }
        match self.inner.as_mut() {
            Some(inner) => {
                self.busy = true;
                Ok(inner)
            }
            None => Err(FtpsError::Closed),
        }
    }

    fn end<T>(&mut self, r: Result<T, FtpsError>) -> Result<T, FtpsError> {
        self.busy = false;
        if let Err(e) = &r {
            let broken = self.inner.as_ref().is_some_and(|i| i.control.is_broken());
            if broken || e.ends_session() {
                debug!("closing ftp session after error: {e}");
                self.inner = None;
            }
        }
        r
    }

    /// List the working directory.
    pub async fn list(&mut self, token: &CancellationToken) -> Result<Vec<ListEntry>, FtpsError> {
        self.do_list(None, token).await
    }

    pub async fn list_path(
        &mut self,
        path: &str,
        token: &CancellationToken,
    ) -> Result<Vec<ListEntry>, FtpsError> {
        let path = self.resolve(path);
        self.do_list(Some(&path), token).await
    }

    async fn do_list(
        &mut self,
        path: Option<&str>,
        token: &CancellationToken,
    ) -> Result<Vec<ListEntry>, FtpsError> {
        let inner = self.begin()?;
        let r = cancellable!(token, inner.list(path));
        let data = self.end(r)?;
        Ok(parse_listing(&data))
    }

    /// Store everything read from `source` as `remote`, returning the byte count.
    pub async fn upload<R>(
        &mut self,
        remote: &str,
        source: &mut R,
        token: &CancellationToken,
    ) -> Result<u64, FtpsError>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let path = self.resolve(remote);
        let inner = self.begin()?;
        let r = cancellable!(token, inner.store(&path, source));
        self.end(r)
    }

    /// Retrieve `remote` into `sink`, returning the byte count.
    pub async fn download<W>(
        &mut self,
        remote: &str,
        sink: &mut W,
        token: &CancellationToken,
    ) -> Result<u64, FtpsError>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let path = self.resolve(remote);
        let inner = self.begin()?;
        let r = cancellable!(token, inner.retrieve(&path, sink));
        self.end(r)
    }

    pub async fn change_directory(
        &mut self,
        path: &str,
        token: &CancellationToken,
    ) -> Result<(), FtpsError> {
        let path = self.resolve(path);
        let inner = self.begin()?;
        let r = cancellable!(token, inner.change_directory(&path));
        let cwd = self.end(r)?;
        debug!("working directory changed to {cwd}");
        self.cwd = cwd;
        Ok(())
    }

    pub async fn make_directory(
        &mut self,
        path: &str,
        token: &CancellationToken,
    ) -> Result<(), FtpsError> {
        let path = self.resolve(path);
        let inner = self.begin()?;
        let r = cancellable!(token, inner.control.make_directory(&path));
        let created = self.end(r)?;
        debug!("directory {} created", created.as_deref().unwrap_or(&path));
        Ok(())
    }

    pub async fn remove_file(
        &mut self,
        path: &str,
        token: &CancellationToken,
    ) -> Result<(), FtpsError> {
        let path = self.resolve(path);
        let inner = self.begin()?;
        let r = cancellable!(token, inner.control.delete_file(&path));
        self.end(r)
    }

    pub async fn rename_file(
        &mut self,
        from: &str,
        to: &str,
        token: &CancellationToken,
    ) -> Result<(), FtpsError> {
        let from = self.resolve(from);
        let to = self.resolve(to);
        let inner = self.begin()?;
        let r = cancellable!(token, inner.control.rename_file(&from, &to));
        self.end(r)
    }

    /// Send QUIT and release the control connection.
    ///
    /// The connection is released even if QUIT fails or the token fires.
    /// Closing an already closed session does nothing.
    pub async fn close(&mut self, token: &CancellationToken) -> Result<(), FtpsError> {
        let interrupted = std::mem::take(&mut self.busy);
        let Some(mut inner) = self.inner.take() else {
            return Ok(());
        };
        if interrupted {
            debug!("dropping control connection with a reply outstanding");
            return Ok(());
        }

        let r = cancellable!(token, inner.control.send_quit());
        if let Err(e) = &r {
            warn!("failed to quit ftp session: {e}");
        }
        if !token.is_cancelled() {
            inner.control.shutdown().await;
        }
        debug!("ftp session closed");
        r
    }
}
