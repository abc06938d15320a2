/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use log::debug;

use super::{FtpsSession, SessionInner};
use crate::connection::FtpsConnectionProvider;
use crate::control::{FtpAuthStatus, FtpControlChannel};
use crate::error::FtpsError;
use crate::options::{DialOptions, TlsMode};
use crate::stream::MaybeTlsStream;
use crate::tls::FtpsTlsConnector;
use crate::transfer::FtpPassiveMode;

pub(super) async fn open_session<P: FtpsConnectionProvider>(
    options: &DialOptions,
    mut provider: P,
    tls: Option<FtpsTlsConnector>,
) -> Result<FtpsSession<P>, FtpsError> {
    let config = options.client_config.clone();

    let stream = match tokio::time::timeout(
        config.connect_timeout,
        provider.new_control_connection(&options.host, options.port),
    )
    .await
    {
        Ok(Ok(stream)) => stream,
        Ok(Err(e)) => return Err(FtpsError::network("connecting control channel", e)),
        Err(_) => return Err(FtpsError::timed_out("connecting control channel")),
    };
    debug!("connected to ftp server {}:{}", options.host, options.port);

    let stream = match (&tls, options.tls_mode) {
        (Some(connector), TlsMode::Implicit) => {
            let tls_stream = connector.connect(stream, "implicit tls handshake").await?;
            MaybeTlsStream::from(tls_stream)
        }
        _ => MaybeTlsStream::Plain(stream),
    };
    let mut control = FtpControlChannel::new(stream, config.control.clone());

    let greeting = control.wait_greeting(config.greeting_timeout).await?;
    debug!("ftp server greeting: {greeting}");

    if let (Some(connector), TlsMode::Explicit) = (&tls, options.tls_mode) {
        control.request_auth_tls().await?;
        control = control.upgrade(connector).await?;
        debug!("control connection upgraded to tls");
    }
    if control.is_tls() {
        control.request_data_protection().await?;
    }

    let (username, password) = options.login_credentials();
    match control.send_username(username).await? {
        FtpAuthStatus::LoggedIn => {}
        FtpAuthStatus::NeedPassword => control.send_password(password).await?,
    }
    debug!("logged in as {username}");

    control.request_binary_type().await?;
    let cwd = control
        .print_working_directory()
        .await?
        .unwrap_or_else(|| "/".to_string());

    let encrypted = control.is_tls();
    let inner = SessionInner {
        passive: FtpPassiveMode::new(config.prefer_epsv),
        config,
        provider,
        control,
        // data connections are protected only when the control connection is
        tls: if encrypted { tls } else { None },
    };
    Ok(FtpsSession {
        inner: Some(inner),
        busy: false,
        cwd,
        greeting: greeting.text(),
        encrypted,
    })
}
