/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::fmt;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use super::FtpControlChannel;
use crate::error::FtpsError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FtpCommand(&'static str);

impl FtpCommand {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for FtpCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

macro_rules! ftp_commands {
    (
        $(
            $(#[$docs:meta])*
            ($konst:ident, $phrase:expr);
        )+
    ) => {
        impl FtpCommand {
        $(
            $(#[$docs])*
            pub const $konst: FtpCommand = FtpCommand($phrase);
        )+
        }
    };
}

ftp_commands! {
    /// a fake command for greeting
    (GREETING, "-");
    (AUTH_TLS, "AUTH TLS");
    (AUTH_SSL, "AUTH SSL");
    (PBSZ_0, "PBSZ 0");
    (PROT_P, "PROT P");
    (USER, "USER");
    (PASS, "PASS");
    (QUIT, "QUIT");
    (TYPE_I, "TYPE I");
    (PWD, "PWD");
    (CWD, "CWD");
    (MKD, "MKD");
    (DELE, "DELE");
    (RNFR, "RNFR");
    (RNTO, "RNTO");
    (PASV, "PASV");
    (EPSV, "EPSV");
    (LIST, "LIST");
    (RETR, "RETR");
    (STOR, "STOR");
}

impl<S> FtpControlChannel<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    async fn send_all(&mut self, buf: &[u8]) -> Result<(), FtpsError> {
        #[cfg(feature = "log-raw-io")]
        crate::debug::log_cmd(String::from_utf8_lossy(buf).trim_end());

        let stream = self.stream.get_mut();
        let r = match stream.write_all(buf).await {
            Ok(_) => stream.flush().await,
            Err(e) => Err(e),
        };
        r.map_err(|e| {
            self.broken = true;
            FtpsError::network("sending command", e)
        })
    }

    pub(crate) async fn send_cmd(&mut self, cmd: FtpCommand) -> Result<(), FtpsError> {
        let len = cmd.0.len() + 2;
        let mut buf: Vec<u8> = Vec::with_capacity(len);
        buf.extend_from_slice(cmd.0.as_bytes());
        buf.extend_from_slice(b"\r\n");

        self.send_all(buf.as_ref()).await
    }

    pub(crate) async fn send_cmd1(
        &mut self,
        cmd: FtpCommand,
        param1: &str,
    ) -> Result<(), FtpsError> {
        if param1.contains(['\r', '\n']) {
            return Err(FtpsError::Configuration(format!(
                "line break in {cmd} argument"
            )));
        }

        let len = cmd.0.len() + 1 + param1.len() + 2;
        let mut buf: Vec<u8> = Vec::with_capacity(len);
        buf.extend_from_slice(cmd.0.as_bytes());
        buf.push(b' ');
        buf.extend_from_slice(param1.as_bytes());
        buf.extend_from_slice(b"\r\n");

        self.send_all(buf.as_ref()).await
    }
}
