/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::io;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use socket2::SockRef;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpSocket, TcpStream};

use crate::reply::DataEndpoint;

/// Opens the raw transports used by a session.
///
/// TLS is applied by the session on top of the returned streams.
#[async_trait]
pub trait FtpsConnectionProvider: Send {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    async fn new_control_connection(
        &mut self,
        host: &str,
        port: u16,
    ) -> io::Result<Self::Stream>;
    async fn new_data_connection(&mut self, endpoint: &DataEndpoint) -> io::Result<Self::Stream>;

    /// Called before an unfinished data connection is dropped, so the peer
    /// sees an aborted transfer rather than a normal end of data.
    fn abort_data_connection(&self, _stream: &Self::Stream) {}
}

#[derive(Debug, Default)]
pub struct TcpConnectionProvider {
    bind_ip: Option<IpAddr>,
    peer_ip: Option<IpAddr>,
}

impl TcpConnectionProvider {
    pub fn new(bind_ip: Option<IpAddr>) -> Self {
        TcpConnectionProvider {
            bind_ip,
            peer_ip: None,
        }
    }

    /// The server address of the control connection.
    pub fn peer_ip(&self) -> Option<IpAddr> {
        self.peer_ip
    }

    async fn connect(&self, addr: SocketAddr) -> io::Result<TcpStream> {
        let socket = match addr {
            SocketAddr::V4(_) => TcpSocket::new_v4()?,
            SocketAddr::V6(_) => TcpSocket::new_v6()?,
        };
        if let Some(ip) = self.bind_ip {
            socket.bind(SocketAddr::new(ip, 0))?;
        }
        let stream = socket.connect(addr).await?;
        stream.set_nodelay(true)?;
        Ok(stream)
    }
}

#[async_trait]
impl FtpsConnectionProvider for TcpConnectionProvider {
    type Stream = TcpStream;

    async fn new_control_connection(&mut self, host: &str, port: u16) -> io::Result<TcpStream> {
        let mut last_err = None;
        for addr in tokio::net::lookup_host((host, port)).await? {
            if let Some(ip) = self.bind_ip
                && ip.is_ipv4() != addr.is_ipv4()
            {
                continue;
            }

            match self.connect(addr).await {
                Ok(stream) => {
                    debug!("control connection to {host} established via {addr}");
                    self.peer_ip = Some(addr.ip());
                    return Ok(stream);
                }
                Err(e) => {
                    debug!("failed to connect to {addr}: {e}");
                    last_err = Some(e);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| {
            io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                format!("no usable address found for {host}"),
            )
        }))
    }

    async fn new_data_connection(&mut self, endpoint: &DataEndpoint) -> io::Result<TcpStream> {
        let Some(peer_ip) = self.peer_ip else {
            return Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "no control connection established",
            ));
        };
        self.connect(endpoint.socket_addr(peer_ip)).await
    }

    fn abort_data_connection(&self, stream: &TcpStream) {
        // zero linger, reset on close
        if let Err(e) = SockRef::from(stream).set_linger(Some(Duration::ZERO)) {
            debug!("failed to set linger on data connection: {e}");
        }
    }
}
