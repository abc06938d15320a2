/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::time::Duration;

#[cfg(feature = "yaml")]
mod yaml;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FtpsControlConfig {
    pub max_line_len: usize,
    pub max_multi_lines: usize,
    pub command_timeout: Duration,
}

impl Default for FtpsControlConfig {
    fn default() -> Self {
        FtpsControlConfig {
            max_line_len: 2048,
            max_multi_lines: 128,
            command_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FtpsTransferConfig {
    pub buffer_size: usize,
    /// max time without any byte moving on the data connection
    pub idle_timeout: Duration,
    /// max time to wait for the completion reply after the data connection is done
    pub end_wait_timeout: Duration,
    pub list_max_size: usize,
}

impl Default for FtpsTransferConfig {
    fn default() -> Self {
        FtpsTransferConfig {
            buffer_size: 16 * 1024,
            idle_timeout: Duration::from_secs(60),
            end_wait_timeout: Duration::from_secs(10),
            list_max_size: 16 * 1024 * 1024,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FtpsClientConfig {
    pub control: FtpsControlConfig,
    pub transfer: FtpsTransferConfig,
    pub connect_timeout: Duration,
    pub tls_handshake_timeout: Duration,
    pub greeting_timeout: Duration,
    /// try EPSV before falling back to PASV
    pub prefer_epsv: bool,
}

impl Default for FtpsClientConfig {
    fn default() -> Self {
        FtpsClientConfig {
            control: FtpsControlConfig::default(),
            transfer: FtpsTransferConfig::default(),
            connect_timeout: Duration::from_secs(30),
            tls_handshake_timeout: Duration::from_secs(10),
            greeting_timeout: Duration::from_secs(10),
            prefer_epsv: true,
        }
    }
}
