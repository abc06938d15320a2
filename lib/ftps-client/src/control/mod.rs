/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::io;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

use crate::config::FtpsControlConfig;
use crate::error::{FtpProtocolError, FtpReplyError, FtpsError};
use crate::io::limited_read_until;
use crate::reply::{DataEndpoint, FtpReply, FtpReplyParser};
use crate::stream::MaybeTlsStream;
use crate::tls::FtpsTlsConnector;

mod command;
pub use command::FtpCommand;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FtpAuthStatus {
    LoggedIn,
    NeedPassword,
}

#[derive(Debug)]
pub(crate) enum FtpTransferStart {
    /// 125 or 150, the data connection is in use
    Proceed,
    /// the server finished without a preliminary reply
    Completed(FtpReply),
}

pub(crate) struct FtpControlChannel<S> {
    config: FtpsControlConfig,
    stream: BufReader<MaybeTlsStream<S>>,
    parser: FtpReplyParser,
    broken: bool,
}

impl<S> FtpControlChannel<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub(crate) fn new(stream: MaybeTlsStream<S>, config: FtpsControlConfig) -> Self {
        let parser = FtpReplyParser::new(config.max_multi_lines);
        FtpControlChannel {
            config,
            stream: BufReader::new(stream),
            parser,
            broken: false,
        }
    }

    #[inline]
    pub(crate) fn is_tls(&self) -> bool {
        self.stream.get_ref().is_tls()
    }

    /// Whether a send or a reply read failed, leaving the command sequence unknown.
    #[inline]
    pub(crate) fn is_broken(&self) -> bool {
        self.broken
    }

    /// Run the TLS handshake on the plain control connection after a successful AUTH.
    pub(crate) async fn upgrade(self, connector: &FtpsTlsConnector) -> Result<Self, FtpsError> {
        if !self.stream.buffer().is_empty() {
            return Err(FtpProtocolError::PendingDataBeforeUpgrade.into());
        }

        let FtpControlChannel {
            config,
            stream,
            parser,
            broken,
        } = self;
        let stream = match stream.into_inner() {
            MaybeTlsStream::Plain(s) => {
                let tls = connector.connect(s, "upgrading control connection").await?;
                MaybeTlsStream::from(tls)
            }
            s => s,
        };
        Ok(FtpControlChannel {
            config,
            stream: BufReader::new(stream),
            parser,
            broken,
        })
    }

    async fn read_reply(&mut self) -> Result<FtpReply, FtpReplyError> {
        let mut buf = Vec::<u8>::with_capacity(256);
        loop {
            buf.clear();
            let (found, len) =
                limited_read_until(&mut self.stream, b'\n', self.config.max_line_len, &mut buf)
                    .await
                    .map_err(FtpReplyError::ReadFailed)?;
            if len == 0 {
                return match self.parser.reset() {
                    Some(code) => Err(FtpReplyError::MissingTerminator(code)),
                    None => Err(FtpReplyError::ConnectionClosed),
                };
            }

            #[cfg(feature = "log-raw-io")]
            crate::debug::log_rsp(String::from_utf8_lossy(&buf).trim_end());

            if !found && len >= self.config.max_line_len {
                self.parser.reset();
                return Err(FtpReplyError::LineTooLong);
            }
            if let Some(reply) = self.parser.feed_line(&buf)? {
                return Ok(reply);
            }
        }
    }

    pub(crate) async fn timed_read_reply(
        &mut self,
        timeout: Duration,
        stage: &'static str,
    ) -> Result<FtpReply, FtpReplyError> {
        let r = match tokio::time::timeout(timeout, self.read_reply()).await {
            Ok(r) => r,
            Err(_) => match self.parser.reset() {
                Some(code) => Err(FtpReplyError::MissingTerminator(code)),
                None => Err(FtpReplyError::ReadReplyTimedOut(stage)),
            },
        };
        if r.is_err() {
            self.broken = true;
        }
        r
    }

    /// Send one command and read back its reply, whatever the code is.
    pub(crate) async fn command(
        &mut self,
        cmd: FtpCommand,
        param: Option<&str>,
        stage: &'static str,
    ) -> Result<FtpReply, FtpsError> {
        match param {
            Some(p) => self.send_cmd1(cmd, p).await?,
            None => self.send_cmd(cmd).await?,
        }
        let reply = self
            .timed_read_reply(self.config.command_timeout, stage)
            .await?;
        Ok(reply)
    }

    pub(crate) async fn wait_greeting(&mut self, timeout: Duration) -> Result<FtpReply, FtpsError> {
        loop {
            let reply = self.timed_read_reply(timeout, "waiting for greeting").await?;
            return match reply.code() {
                120 => continue,
                220 => Ok(reply),
                421 => Err(FtpsError::remote(FtpCommand::GREETING, &reply)),
                n => Err(FtpProtocolError::UnexpectedReply(FtpCommand::GREETING, n, reply.text()).into()),
            };
        }
    }

    /// Ask for the explicit TLS upgrade, AUTH TLS first then AUTH SSL.
    pub(crate) async fn request_auth_tls(&mut self) -> Result<(), FtpsError> {
        let cmd = FtpCommand::AUTH_TLS;
        let reply = self.command(cmd, None, "request auth tls").await?;
        match reply.code() {
            234 => return Ok(()),
            500 | 502 | 504 => {}
            421 => return Err(FtpsError::remote(cmd, &reply)),
            _ => return Err(auth_tls_refused(cmd, &reply)),
        }

        let cmd = FtpCommand::AUTH_SSL;
        let reply = self.command(cmd, None, "request auth ssl").await?;
        match reply.code() {
            234 | 334 => Ok(()),
            421 => Err(FtpsError::remote(cmd, &reply)),
            _ => Err(auth_tls_refused(cmd, &reply)),
        }
    }

    pub(crate) async fn request_data_protection(&mut self) -> Result<(), FtpsError> {
        for cmd in [FtpCommand::PBSZ_0, FtpCommand::PROT_P] {
            let reply = self.command(cmd, None, "request data protection").await?;
            if !reply.is_completion() {
                return Err(FtpsError::unexpected(cmd, &reply));
            }
        }
        Ok(())
    }

    pub(crate) async fn send_username(&mut self, name: &str) -> Result<FtpAuthStatus, FtpsError> {
        let cmd = FtpCommand::USER;
        let reply = self.command(cmd, Some(name), "send username").await?;
        match reply.code() {
            230 => Ok(FtpAuthStatus::LoggedIn),
            331 => Ok(FtpAuthStatus::NeedPassword),
            // accounts are not supported
            332 => Err(FtpsError::auth(cmd, &reply)),
            400..=499 => Err(FtpsError::remote(cmd, &reply)),
            500..=599 => Err(FtpsError::auth(cmd, &reply)),
            _ => Err(FtpsError::unexpected(cmd, &reply)),
        }
    }

    pub(crate) async fn send_password(&mut self, pass: &str) -> Result<(), FtpsError> {
        let cmd = FtpCommand::PASS;
        let reply = self.command(cmd, Some(pass), "send password").await?;
        match reply.code() {
            // 202 means the password is superfluous
            230 | 202 => Ok(()),
            332 => Err(FtpsError::auth(cmd, &reply)),
            400..=499 => Err(FtpsError::remote(cmd, &reply)),
            500..=599 => Err(FtpsError::auth(cmd, &reply)),
            _ => Err(FtpsError::unexpected(cmd, &reply)),
        }
    }

    pub(crate) async fn request_binary_type(&mut self) -> Result<(), FtpsError> {
        let cmd = FtpCommand::TYPE_I;
        let reply = self.command(cmd, None, "request transfer type").await?;
        match reply.code() {
            200 => Ok(()),
            _ => Err(FtpsError::unexpected(cmd, &reply)),
        }
    }

    /// Returns `None` if the server refuses to tell.
    pub(crate) async fn print_working_directory(&mut self) -> Result<Option<String>, FtpsError> {
        let cmd = FtpCommand::PWD;
        let reply = self.command(cmd, None, "print working directory").await?;
        match reply.code() {
            257 => match reply.quoted_path() {
                Some(path) => Ok(Some(path)),
                None => Err(FtpProtocolError::InvalidReplySyntax(cmd, reply.text()).into()),
            },
            421 => Err(FtpsError::remote(cmd, &reply)),
            400..=599 => Ok(None),
            _ => Err(FtpsError::unexpected(cmd, &reply)),
        }
    }

    pub(crate) async fn change_working_directory(&mut self, path: &str) -> Result<(), FtpsError> {
        let cmd = FtpCommand::CWD;
        let reply = self
            .command(cmd, Some(path), "change working directory")
            .await?;
        match reply.code() {
            250 | 200 => Ok(()),
            _ => Err(FtpsError::unexpected(cmd, &reply)),
        }
    }

    /// Returns the created path if the server tells it.
    pub(crate) async fn make_directory(&mut self, path: &str) -> Result<Option<String>, FtpsError> {
        let cmd = FtpCommand::MKD;
        let reply = self.command(cmd, Some(path), "make directory").await?;
        match reply.code() {
            257 => Ok(reply.quoted_path()),
            521 => Err(already_exists(path, &reply)),
            550 if reply.text().to_ascii_lowercase().contains("exist") => {
                Err(already_exists(path, &reply))
            }
            _ => Err(FtpsError::unexpected(cmd, &reply)),
        }
    }

    pub(crate) async fn delete_file(&mut self, path: &str) -> Result<(), FtpsError> {
        let cmd = FtpCommand::DELE;
        let reply = self.command(cmd, Some(path), "delete file").await?;
        match reply.code() {
            250 | 200 => Ok(()),
            _ => Err(FtpsError::unexpected(cmd, &reply)),
        }
    }

    pub(crate) async fn rename_file(&mut self, from: &str, to: &str) -> Result<(), FtpsError> {
        let cmd = FtpCommand::RNFR;
        let reply = self.command(cmd, Some(from), "rename from").await?;
        if reply.code() != 350 {
            return Err(FtpsError::unexpected(cmd, &reply));
        }

        let cmd = FtpCommand::RNTO;
        let reply = self.command(cmd, Some(to), "rename to").await?;
        match reply.code() {
            250 => Ok(()),
            400..=599 => Err(FtpsError::RenameIncomplete {
                from: from.to_string(),
                to: to.to_string(),
                code: reply.code(),
                message: reply.text(),
            }),
            _ => Err(FtpsError::unexpected(cmd, &reply)),
        }
    }

    pub(crate) async fn request_pasv(&mut self) -> Result<DataEndpoint, FtpsError> {
        let cmd = FtpCommand::PASV;
        let reply = self.command(cmd, None, "request pasv").await?;
        match reply.code() {
            227 => DataEndpoint::parse_pasv(&reply.text())
                .ok_or_else(|| FtpProtocolError::InvalidReplySyntax(cmd, reply.text()).into()),
            _ => Err(FtpsError::unexpected(cmd, &reply)),
        }
    }

    /// Returns `None` if the server does not support EPSV.
    pub(crate) async fn request_epsv(&mut self) -> Result<Option<DataEndpoint>, FtpsError> {
        let cmd = FtpCommand::EPSV;
        let reply = self.command(cmd, None, "request epsv").await?;
        match reply.code() {
            229 => match DataEndpoint::parse_epsv(&reply.text()) {
                Some(endpoint) => Ok(Some(endpoint)),
                None => Err(FtpProtocolError::InvalidReplySyntax(cmd, reply.text()).into()),
            },
            500 | 501 | 502 | 522 => Ok(None),
            _ => Err(FtpsError::unexpected(cmd, &reply)),
        }
    }

    /// Send LIST, RETR or STOR and wait for the preliminary reply.
    pub(crate) async fn start_transfer(
        &mut self,
        cmd: FtpCommand,
        path: Option<&str>,
    ) -> Result<FtpTransferStart, FtpsError> {
        let reply = self.command(cmd, path, "start transfer").await?;
        match reply.code() {
            125 | 150 => Ok(FtpTransferStart::Proceed),
            200..=299 => Ok(FtpTransferStart::Completed(reply)),
            _ => Err(FtpsError::unexpected(cmd, &reply)),
        }
    }

    /// Read the completion reply of a transfer.
    pub(crate) async fn wait_transfer_end(
        &mut self,
        cmd: FtpCommand,
        timeout: Duration,
    ) -> Result<FtpReply, FtpsError> {
        let reply = self.timed_read_reply(timeout, "waiting transfer end").await?;
        if reply.is_completion() {
            Ok(reply)
        } else {
            Err(FtpsError::unexpected(cmd, &reply))
        }
    }

    pub(crate) async fn send_quit(&mut self) -> Result<(), FtpsError> {
        let cmd = FtpCommand::QUIT;
        let reply = self.command(cmd, None, "send quit").await?;
        if reply.is_completion() {
            Ok(())
        } else {
            Err(FtpsError::unexpected(cmd, &reply))
        }
    }

    /// Close the transport, sending close_notify first on TLS connections.
    pub(crate) async fn shutdown(&mut self) {
        let _ = tokio::time::timeout(
            self.config.command_timeout,
            self.stream.get_mut().shutdown(),
        )
        .await;
    }
}

fn auth_tls_refused(cmd: FtpCommand, reply: &FtpReply) -> FtpsError {
    FtpsError::tls(
        "requesting tls upgrade",
        io::Error::other(format!("{cmd} refused: {reply}")),
    )
}

fn already_exists(path: &str, reply: &FtpReply) -> FtpsError {
    FtpsError::AlreadyExists {
        path: path.to_string(),
        code: reply.code(),
        message: reply.text(),
    }
}
