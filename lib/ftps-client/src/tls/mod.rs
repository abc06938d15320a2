/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use rustls::{ClientConfig, ClientConnection, HandshakeKind, RootCertStore};
use rustls_pki_types::pem::PemObject;
use rustls_pki_types::{CertificateDer, ServerName};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;

use crate::error::FtpsError;

mod verify;
use verify::InsecureServerCertVerifier;

pub(crate) trait RustlsClientConnectionExt {
    fn session_reused(&self) -> bool;
}

impl RustlsClientConnectionExt for ClientConnection {
    fn session_reused(&self) -> bool {
        matches!(self.handshake_kind(), Some(HandshakeKind::Resumed))
    }
}

/// How the server certificate is checked.
#[derive(Clone, Debug, Default)]
pub enum TlsTrust {
    /// the bundled Mozilla root certificates
    #[default]
    WebPki,
    CaCerts(Vec<CertificateDer<'static>>),
    /// accept any certificate, for test servers only
    InsecureSkipVerify,
}

impl TlsTrust {
    /// Load CA certificates from a PEM file.
    pub fn from_pem_file<P: AsRef<Path>>(path: P) -> Result<Self, FtpsError> {
        let path = path.as_ref();
        let certs = CertificateDer::pem_file_iter(path)
            .and_then(|iter| iter.collect::<Result<Vec<_>, _>>())
            .map_err(|e| {
                FtpsError::Configuration(format!(
                    "failed to load ca certificates from {}: {e}",
                    path.display()
                ))
            })?;
        Self::from_certs(certs)
    }

    pub fn from_pem_slice(data: &[u8]) -> Result<Self, FtpsError> {
        let certs = CertificateDer::pem_slice_iter(data)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| FtpsError::Configuration(format!("invalid ca certificate: {e}")))?;
        Self::from_certs(certs)
    }

    fn from_certs(certs: Vec<CertificateDer<'static>>) -> Result<Self, FtpsError> {
        if certs.is_empty() {
            return Err(FtpsError::Configuration(
                "no ca certificate found".to_string(),
            ));
        }
        Ok(TlsTrust::CaCerts(certs))
    }
}

#[derive(Clone, Debug, Default)]
pub struct FtpsTlsConfig {
    pub trust: TlsTrust,
    /// the name to verify, the dial host will be used if not set
    pub server_name: Option<String>,
}

impl FtpsTlsConfig {
    pub fn new(trust: TlsTrust) -> Self {
        FtpsTlsConfig {
            trust,
            server_name: None,
        }
    }

    pub fn insecure() -> Self {
        FtpsTlsConfig::new(TlsTrust::InsecureSkipVerify)
    }

    pub fn with_server_name(mut self, name: impl Into<String>) -> Self {
        self.server_name = Some(name.into());
        self
    }

    fn build_client_config(&self) -> Result<ClientConfig, FtpsError> {
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let builder = ClientConfig::builder_with_provider(provider.clone())
            .with_safe_default_protocol_versions()
            .map_err(|e| FtpsError::Configuration(format!("invalid tls protocol versions: {e}")))?;

        let config = match &self.trust {
            TlsTrust::WebPki => {
                let mut roots = RootCertStore::empty();
                roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
                builder.with_root_certificates(roots).with_no_client_auth()
            }
            TlsTrust::CaCerts(certs) => {
                let mut roots = RootCertStore::empty();
                for cert in certs {
                    roots.add(cert.clone()).map_err(|e| {
                        FtpsError::Configuration(format!("unsupported ca certificate: {e}"))
                    })?;
                }
                builder.with_root_certificates(roots).with_no_client_auth()
            }
            TlsTrust::InsecureSkipVerify => builder
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(InsecureServerCertVerifier::new(
                    provider,
                )))
                .with_no_client_auth(),
        };
        Ok(config)
    }

    /// Build the connector shared by the control connection and all data connections.
    pub(crate) fn build_connector(
        &self,
        host: &str,
        handshake_timeout: Duration,
    ) -> Result<FtpsTlsConnector, FtpsError> {
        let name = self.server_name.as_deref().unwrap_or(host);
        let server_name = ServerName::try_from(name.to_string())
            .map_err(|_| FtpsError::Configuration(format!("invalid tls server name {name}")))?;

        let config = self.build_client_config()?;
        Ok(FtpsTlsConnector {
            connector: TlsConnector::from(Arc::new(config)),
            server_name,
            handshake_timeout,
        })
    }
}

pub(crate) struct FtpsTlsConnector {
    connector: TlsConnector,
    server_name: ServerName<'static>,
    handshake_timeout: Duration,
}

impl FtpsTlsConnector {
    async fn handshake<S>(&self, stream: S) -> io::Result<TlsStream<S>>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let handshake = self.connector.connect(self.server_name.clone(), stream);
        match tokio::time::timeout(self.handshake_timeout, handshake).await {
            Ok(r) => r,
            Err(_) => Err(io::Error::new(
                io::ErrorKind::TimedOut,
                "tls handshake timed out",
            )),
        }
    }

    pub(crate) async fn connect<S>(
        &self,
        stream: S,
        stage: &'static str,
    ) -> Result<TlsStream<S>, FtpsError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        self.handshake(stream)
            .await
            .map_err(|e| FtpsError::tls(stage, e))
    }

    /// Handshake on a data connection.
    ///
    /// `None` if the peer closed the connection instead of answering the
    /// handshake, which some servers do for a transfer without any data.
    pub(crate) async fn connect_data<S>(
        &self,
        stream: S,
        stage: &'static str,
    ) -> Result<Option<TlsStream<S>>, FtpsError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        match self.handshake(stream).await {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(None),
            Err(e) => Err(FtpsError::tls(stage, e)),
        }
    }
}
