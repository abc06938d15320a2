/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;

/// Where the server listens for the next passive data connection.
///
/// `ip` is `None` for EPSV replies, which only carry the port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataEndpoint {
    pub ip: Option<IpAddr>,
    pub port: u16,
}

impl DataEndpoint {
    /// Parse the text of a 227 reply.
    ///
    /// The first run of six comma separated numbers is used, with or
    /// without the surrounding parentheses.
    pub fn parse_pasv(text: &str) -> Option<Self> {
        let bytes = text.as_bytes();
        let mut offset = 0;
        while offset < bytes.len() {
            if !bytes[offset].is_ascii_digit() {
                offset += 1;
                continue;
            }

            let end = bytes[offset..]
                .iter()
                .position(|c| !c.is_ascii_digit() && *c != b',')
                .map(|p| p + offset)
                .unwrap_or(bytes.len());
            if let Some(endpoint) = Self::parse_h1_p2(&text[offset..end]) {
                return Some(endpoint);
            }
            offset = end;
        }
        None
    }

    fn parse_h1_p2(s: &str) -> Option<Self> {
        let a: Vec<&str> = s.trim_end_matches(',').split(',').collect();
        if a.len() != 6 {
            return None;
        }

        let mut v = [0u8; 6];
        for (i, s) in a.iter().enumerate() {
            v[i] = u8::from_str(s).ok()?;
        }

        let ip = IpAddr::V4(Ipv4Addr::new(v[0], v[1], v[2], v[3]));
        let port = ((v[4] as u16) << 8) + (v[5] as u16);
        if port == 0 {
            return None;
        }
        Some(DataEndpoint { ip: Some(ip), port })
    }

    /// Parse the text of a 229 reply: `(<d><d><d>port<d>)`.
    pub fn parse_epsv(text: &str) -> Option<Self> {
        let p_start = memchr::memchr(b'(', text.as_bytes())?;
        let p_end = memchr::memchr(b')', &text.as_bytes()[p_start..])? + p_start;
        let inner = text[p_start + 1..p_end].as_bytes();
        if inner.len() < 5 {
            return None;
        }

        let d = inner[0];
        if !(33..=126).contains(&d) || d.is_ascii_digit() {
            return None;
        }
        if inner[1] != d || inner[2] != d || inner[inner.len() - 1] != d {
            return None;
        }

        let port_s = std::str::from_utf8(&inner[3..inner.len() - 1]).ok()?;
        let port = u16::from_str(port_s).ok()?;
        if port == 0 {
            return None;
        }
        Some(DataEndpoint { ip: None, port })
    }

    /// The address to connect to, `peer` standing in for a missing or unspecified IP.
    pub fn socket_addr(&self, peer: IpAddr) -> SocketAddr {
        match self.ip {
            Some(ip) if !ip.is_unspecified() => SocketAddr::new(ip, self.port),
            _ => SocketAddr::new(peer, self.port),
        }
    }
}

impl fmt::Display for DataEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ip {
            Some(ip) => write!(f, "{}", SocketAddr::new(ip, self.port)),
            None => write!(f, "<peer>:{}", self.port),
        }
    }
}
