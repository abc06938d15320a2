/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::io;

use thiserror::Error;

use crate::control::FtpCommand;
use crate::reply::FtpReply;

mod reply;
pub use reply::FtpReplyError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FtpRemoteSeverity {
    /// 4xx, the same command may succeed later
    Transient,
    /// 5xx
    Permanent,
}

impl FtpRemoteSeverity {
    fn from_code(code: u16) -> Self {
        if code / 100 == 4 {
            FtpRemoteSeverity::Transient
        } else {
            FtpRemoteSeverity::Permanent
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FtpsErrorKind {
    Network,
    Tls,
    Protocol,
    Auth,
    Remote(FtpRemoteSeverity),
    Configuration,
    Closed,
    Cancelled,
}

#[derive(Debug, Error)]
pub enum FtpProtocolError {
    #[error("invalid reply: {0}")]
    InvalidReply(FtpReplyError),
    #[error("unexpected reply to {0}: {1} {2}")]
    UnexpectedReply(FtpCommand, u16, String),
    #[error("invalid {0} reply syntax: {1}")]
    InvalidReplySyntax(FtpCommand, String),
    #[error("data stream has already been used for a transfer")]
    DataStreamReused,
    #[error("unread data on the control connection before the tls handshake")]
    PendingDataBeforeUpgrade,
    #[error("directory listing exceeds {0} bytes")]
    ListingTooLarge(usize),
    #[error("a reply is still outstanding from an interrupted operation")]
    Desynchronized,
}

#[derive(Debug, Error)]
pub enum FtpsError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("network error while {stage}: {source}")]
    Network {
        stage: &'static str,
        #[source]
        source: io::Error,
    },
    #[error("tls error while {stage}: {source}")]
    Tls {
        stage: &'static str,
        #[source]
        source: io::Error,
    },
    #[error("protocol error: {0}")]
    Protocol(#[from] FtpProtocolError),
    #[error("authentication failed at {command}: {code} {message}")]
    Auth {
        command: FtpCommand,
        code: u16,
        message: String,
    },
    #[error("{command} rejected by server: {code} {message}")]
    Remote {
        command: FtpCommand,
        code: u16,
        message: String,
    },
    #[error("directory {path} already exists: {code} {message}")]
    AlreadyExists {
        path: String,
        code: u16,
        message: String,
    },
    #[error("rename {from} -> {to} rejected at RNTO: {code} {message} (source left unchanged)")]
    RenameIncomplete {
        from: String,
        to: String,
        code: u16,
        message: String,
    },
    #[error("session is closed")]
    Closed,
    #[error("operation cancelled")]
    Cancelled,
}

impl FtpsError {
    pub fn kind(&self) -> FtpsErrorKind {
        match self {
            FtpsError::Configuration(_) => FtpsErrorKind::Configuration,
            FtpsError::Network { .. } => FtpsErrorKind::Network,
            FtpsError::Tls { .. } => FtpsErrorKind::Tls,
            FtpsError::Protocol(_) => FtpsErrorKind::Protocol,
            FtpsError::Auth { .. } => FtpsErrorKind::Auth,
            FtpsError::Remote { code, .. }
            | FtpsError::AlreadyExists { code, .. }
            | FtpsError::RenameIncomplete { code, .. } => {
                FtpsErrorKind::Remote(FtpRemoteSeverity::from_code(*code))
            }
            FtpsError::Closed => FtpsErrorKind::Closed,
            FtpsError::Cancelled => FtpsErrorKind::Cancelled,
        }
    }

    /// The reply code if the error was caused by a server reply.
    pub fn reply_code(&self) -> Option<u16> {
        match self {
            FtpsError::Auth { code, .. }
            | FtpsError::Remote { code, .. }
            | FtpsError::AlreadyExists { code, .. }
            | FtpsError::RenameIncomplete { code, .. } => Some(*code),
            FtpsError::Protocol(FtpProtocolError::UnexpectedReply(_, code, _)) => Some(*code),
            _ => None,
        }
    }

    pub(crate) fn network(stage: &'static str, source: io::Error) -> Self {
        FtpsError::Network { stage, source }
    }

    pub(crate) fn tls(stage: &'static str, source: io::Error) -> Self {
        FtpsError::Tls { stage, source }
    }

    pub(crate) fn timed_out(stage: &'static str) -> Self {
        FtpsError::Network {
            stage,
            source: io::Error::new(io::ErrorKind::TimedOut, "timed out"),
        }
    }

    pub(crate) fn remote(command: FtpCommand, reply: &FtpReply) -> Self {
        FtpsError::Remote {
            command,
            code: reply.code(),
            message: reply.text(),
        }
    }

    pub(crate) fn auth(command: FtpCommand, reply: &FtpReply) -> Self {
        FtpsError::Auth {
            command,
            code: reply.code(),
            message: reply.text(),
        }
    }

    /// Map a reply that does not fit the command:
    /// negative ones are reported as they are, others break the sequence.
    pub(crate) fn unexpected(command: FtpCommand, reply: &FtpReply) -> Self {
        if reply.is_negative() {
            FtpsError::remote(command, reply)
        } else {
            FtpsError::Protocol(FtpProtocolError::UnexpectedReply(
                command,
                reply.code(),
                reply.text(),
            ))
        }
    }

    /// Whether the control connection must be dropped whatever its state is.
    pub(crate) fn ends_session(&self) -> bool {
        matches!(self.kind(), FtpsErrorKind::Cancelled | FtpsErrorKind::Closed)
            || self.reply_code() == Some(421)
    }
}

impl From<FtpReplyError> for FtpsError {
    fn from(e: FtpReplyError) -> Self {
        match e {
            FtpReplyError::ReadFailed(e) => FtpsError::network("reading reply", e),
            FtpReplyError::ConnectionClosed => FtpsError::network(
                "reading reply",
                io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "control connection closed by peer",
                ),
            ),
            FtpReplyError::ReadReplyTimedOut(stage) => FtpsError::timed_out(stage),
            e => FtpsError::Protocol(FtpProtocolError::InvalidReply(e)),
        }
    }
}
