/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::time::Duration;

use log::debug;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::connection::FtpsConnectionProvider;
use crate::control::FtpControlChannel;
use crate::error::FtpsError;
use crate::reply::DataEndpoint;

/// Passive mode state kept across the transfers of one session.
pub(crate) struct FtpPassiveMode {
    use_epsv: bool,
}

impl FtpPassiveMode {
    pub(crate) fn new(prefer_epsv: bool) -> Self {
        FtpPassiveMode {
            use_epsv: prefer_epsv,
        }
    }

    /// Ask the server where to connect for the next transfer.
    ///
    /// EPSV is given up for the rest of the session once the server refuses it.
    pub(crate) async fn request_endpoint<S>(
        &mut self,
        control: &mut FtpControlChannel<S>,
    ) -> Result<DataEndpoint, FtpsError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        if self.use_epsv {
            match control.request_epsv().await? {
                Some(endpoint) => return Ok(endpoint),
                None => {
                    debug!("EPSV not supported by server, falling back to PASV");
                    self.use_epsv = false;
                }
            }
        }
        control.request_pasv().await
    }
}

pub(crate) async fn connect_data<P>(
    provider: &mut P,
    endpoint: &DataEndpoint,
    timeout: Duration,
) -> Result<P::Stream, FtpsError>
where
    P: FtpsConnectionProvider,
{
    match tokio::time::timeout(timeout, provider.new_data_connection(endpoint)).await {
        Ok(Ok(stream)) => {
            debug!("data connection to {endpoint} established");
            Ok(stream)
        }
        Ok(Err(e)) => Err(FtpsError::network("connecting data channel", e)),
        Err(_) => Err(FtpsError::timed_out("connecting data channel")),
    }
}
