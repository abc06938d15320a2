/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use crate::config::FtpsClientConfig;
use crate::error::FtpsError;
use crate::tls::{FtpsTlsConfig, FtpsTlsConnector};

const ANONYMOUS_USERNAME: &str = "anonymous";
const ANONYMOUS_PASSWORD: &str = "anonymous@";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TlsMode {
    /// plain connect, then AUTH TLS
    #[default]
    Explicit,
    /// TLS from the first byte
    Implicit,
    None,
}

impl TlsMode {
    pub fn default_port(&self) -> u16 {
        match self {
            TlsMode::Implicit => 990,
            TlsMode::Explicit | TlsMode::None => 21,
        }
    }
}

impl FromStr for TlsMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "explicit" => Ok(TlsMode::Explicit),
            "implicit" => Ok(TlsMode::Implicit),
            "none" | "plain" => Ok(TlsMode::None),
            _ => Err(()),
        }
    }
}

/// Everything needed to set up a session.
#[derive(Clone)]
pub struct DialOptions {
    pub host: String,
    pub port: u16,
    /// empty for anonymous login
    pub username: String,
    pub password: String,
    pub tls_mode: TlsMode,
    pub tls_config: FtpsTlsConfig,
    /// must be set to use [`TlsMode::None`]
    pub allow_unencrypted: bool,
    /// local address for the control and data connections
    pub bind_ip: Option<IpAddr>,
    pub client_config: FtpsClientConfig,
}

impl fmt::Debug for DialOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DialOptions")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"****")
            .field("tls_mode", &self.tls_mode)
            .field("tls_config", &self.tls_config)
            .field("allow_unencrypted", &self.allow_unencrypted)
            .field("bind_ip", &self.bind_ip)
            .field("client_config", &self.client_config)
            .finish()
    }
}

impl DialOptions {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        DialOptions {
            host: host.into(),
            port,
            username: String::new(),
            password: String::new(),
            tls_mode: TlsMode::default(),
            tls_config: FtpsTlsConfig::default(),
            allow_unencrypted: false,
            bind_ip: None,
            client_config: FtpsClientConfig::default(),
        }
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    pub fn with_tls_mode(mut self, mode: TlsMode) -> Self {
        self.tls_mode = mode;
        self
    }

    pub fn with_tls_config(mut self, config: FtpsTlsConfig) -> Self {
        self.tls_config = config;
        self
    }

    pub fn with_allow_unencrypted(mut self, allow: bool) -> Self {
        self.allow_unencrypted = allow;
        self
    }

    pub fn with_bind_ip(mut self, ip: IpAddr) -> Self {
        self.bind_ip = Some(ip);
        self
    }

    pub fn with_client_config(mut self, config: FtpsClientConfig) -> Self {
        self.client_config = config;
        self
    }

    pub(crate) fn login_credentials(&self) -> (&str, &str) {
        if self.username.is_empty() {
            let password = if self.password.is_empty() {
                ANONYMOUS_PASSWORD
            } else {
                self.password.as_str()
            };
            (ANONYMOUS_USERNAME, password)
        } else {
            (self.username.as_str(), self.password.as_str())
        }
    }

    /// Check the options before any connection is made.
    ///
    /// Returns the TLS connector unless the session is unencrypted.
    pub(crate) fn validate(&self) -> Result<Option<FtpsTlsConnector>, FtpsError> {
        if self.host.is_empty() {
            return Err(FtpsError::Configuration("empty host".to_string()));
        }
        if self.port == 0 {
            return Err(FtpsError::Configuration("invalid port 0".to_string()));
        }
        let control = &self.client_config.control;
        if control.max_line_len == 0 {
            return Err(FtpsError::Configuration(
                "zero reply line length limit".to_string(),
            ));
        }
        if control.max_multi_lines == 0 {
            return Err(FtpsError::Configuration(
                "zero multi-line reply limit".to_string(),
            ));
        }
        if self.client_config.transfer.buffer_size == 0 {
            return Err(FtpsError::Configuration(
                "zero transfer buffer size".to_string(),
            ));
        }

        match self.tls_mode {
            TlsMode::None => {
                if self.allow_unencrypted {
                    Ok(None)
                } else {
                    Err(FtpsError::Configuration(
                        "unencrypted session requested but not allowed".to_string(),
                    ))
                }
            }
            TlsMode::Explicit | TlsMode::Implicit => {
                let connector = self
                    .tls_config
                    .build_connector(&self.host, self.client_config.tls_handshake_timeout)?;
                Ok(Some(connector))
            }
        }
    }
}
