/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

mod config;
pub use config::{FtpsClientConfig, FtpsControlConfig, FtpsTransferConfig};

mod error;
pub use error::{
    FtpProtocolError, FtpRemoteSeverity, FtpReplyError, FtpsError, FtpsErrorKind,
};

mod debug;
pub use debug::{FTP_DEBUG_LOG_LEVEL, FTP_DEBUG_LOG_TARGET};

mod io;

mod reply;
pub use reply::{DataEndpoint, FtpReply, FtpReplyClass, FtpReplyParser};

mod control;
pub use control::FtpCommand;

mod connection;
pub use connection::{FtpsConnectionProvider, TcpConnectionProvider};

mod stream;
pub use stream::MaybeTlsStream;

mod tls;
pub use tls::{FtpsTlsConfig, TlsTrust};

mod transfer;
pub use transfer::FtpDataStream;

mod listing;
pub use listing::{ListEntry, parse_listing};

pub mod path;

mod options;
pub use options::{DialOptions, TlsMode};

mod session;
pub use session::FtpsSession;
