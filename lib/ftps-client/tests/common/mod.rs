/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rustls::ServerConfig;
use rustls_pki_types::pem::PemObject;
use rustls_pki_types::{CertificateDer, PrivateKeyDer};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::TlsAcceptor;

use ftps_client::{DialOptions, FtpsTlsConfig, TlsMode, TlsTrust};

pub const CA_CERT: &[u8] = include_bytes!("../certs/ca.pem");
const SERVER_CERT: &[u8] = include_bytes!("../certs/server.pem");
const SERVER_KEY: &[u8] = include_bytes!("../certs/server-key.pem");

/// RETR on this path opens the data connection and then never sends anything.
pub const STALL_PATH: &str = "/stall";
/// RETR on this path sends [`BROKEN_CONTENT`], drops the data connection and replies 426.
pub const BROKEN_PATH: &str = "/broken";
pub const BROKEN_CONTENT: &[u8] = b"partial";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    File(Vec<u8>),
    Directory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverError {
    NotFound,
    Exists,
    Denied,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeStat {
    pub is_dir: bool,
    pub size: u64,
}

/// What the server double needs from its storage and user database.
pub trait FtpDriver: Send + Sync + 'static {
    fn authenticate(&self, username: &str, password: &str) -> bool;
    fn list(&self, dir: &str) -> Result<Vec<(String, NodeStat)>, DriverError>;
    fn read(&self, path: &str) -> Result<Vec<u8>, DriverError>;
    fn write(&self, path: &str, data: Vec<u8>) -> Result<(), DriverError>;
    fn make_directory(&self, path: &str) -> Result<(), DriverError>;
    fn delete(&self, path: &str) -> Result<(), DriverError>;
    fn rename(&self, from: &str, to: &str) -> Result<(), DriverError>;
    fn stat(&self, path: &str) -> Result<NodeStat, DriverError>;
}

fn parent_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => "/",
        Some(i) => &path[..i],
    }
}

fn name_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(i) => &path[i + 1..],
        None => path,
    }
}

fn stat_of(node: &Node) -> NodeStat {
    match node {
        Node::File(data) => NodeStat {
            is_dir: false,
            size: data.len() as u64,
        },
        Node::Directory => NodeStat {
            is_dir: true,
            size: 0,
        },
    }
}

/// Storage keyed by normalized absolute path.
pub struct MemoryDriver {
    username: String,
    password: String,
    nodes: Mutex<BTreeMap<String, Node>>,
}

impl MemoryDriver {
    /// An empty username lets anyone in as `anonymous`.
    pub fn new(username: &str, password: &str) -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert("/".to_string(), Node::Directory);
        MemoryDriver {
            username: username.to_string(),
            password: password.to_string(),
            nodes: Mutex::new(nodes),
        }
    }

    pub fn get(&self, path: &str) -> Option<Node> {
        self.nodes.lock().unwrap().get(path).cloned()
    }

    fn check_parent(nodes: &BTreeMap<String, Node>, path: &str) -> Result<(), DriverError> {
        match nodes.get(parent_of(path)) {
            Some(Node::Directory) => Ok(()),
            Some(Node::File(_)) => Err(DriverError::Denied),
            None => Err(DriverError::NotFound),
        }
    }
}

impl FtpDriver for MemoryDriver {
    fn authenticate(&self, username: &str, password: &str) -> bool {
        if self.username.is_empty() {
            username == "anonymous"
        } else {
            self.username == username && self.password == password
        }
    }

    fn list(&self, dir: &str) -> Result<Vec<(String, NodeStat)>, DriverError> {
        let nodes = self.nodes.lock().unwrap();
        match nodes.get(dir) {
            Some(Node::Directory) => {}
            Some(Node::File(_)) => return Err(DriverError::Denied),
            None => return Err(DriverError::NotFound),
        }
        Ok(nodes
            .iter()
            .filter(|(path, _)| path.as_str() != "/" && parent_of(path) == dir)
            .map(|(path, node)| (name_of(path).to_string(), stat_of(node)))
            .collect())
    }

    fn read(&self, path: &str) -> Result<Vec<u8>, DriverError> {
        match self.nodes.lock().unwrap().get(path) {
            Some(Node::File(data)) => Ok(data.clone()),
            Some(Node::Directory) => Err(DriverError::Denied),
            None => Err(DriverError::NotFound),
        }
    }

    fn write(&self, path: &str, data: Vec<u8>) -> Result<(), DriverError> {
        let mut nodes = self.nodes.lock().unwrap();
        Self::check_parent(&nodes, path)?;
        if let Some(Node::Directory) = nodes.get(path) {
            return Err(DriverError::Denied);
        }
        nodes.insert(path.to_string(), Node::File(data));
        Ok(())
    }

    fn make_directory(&self, path: &str) -> Result<(), DriverError> {
        let mut nodes = self.nodes.lock().unwrap();
        Self::check_parent(&nodes, path)?;
        if nodes.contains_key(path) {
            return Err(DriverError::Exists);
        }
        nodes.insert(path.to_string(), Node::Directory);
        Ok(())
    }

    fn delete(&self, path: &str) -> Result<(), DriverError> {
        let mut nodes = self.nodes.lock().unwrap();
        match nodes.get(path) {
            Some(Node::File(_)) => {
                nodes.remove(path);
                Ok(())
            }
            Some(Node::Directory) => Err(DriverError::Denied),
            None => Err(DriverError::NotFound),
        }
    }

    fn rename(&self, from: &str, to: &str) -> Result<(), DriverError> {
        let mut nodes = self.nodes.lock().unwrap();
        if !nodes.contains_key(from) || from == "/" {
            return Err(DriverError::NotFound);
        }
        Self::check_parent(&nodes, to)?;
        if nodes.contains_key(to) {
            return Err(DriverError::Exists);
        }

        let prefix = format!("{from}/");
        let moved: Vec<String> = nodes
            .keys()
            .filter(|k| k.as_str() == from || k.starts_with(&prefix))
            .cloned()
            .collect();
        for old in moved {
            if let Some(node) = nodes.remove(&old) {
                let new = format!("{to}{}", &old[from.len()..]);
                nodes.insert(new, node);
            }
        }
        Ok(())
    }

    fn stat(&self, path: &str) -> Result<NodeStat, DriverError> {
        match self.nodes.lock().unwrap().get(path) {
            Some(node) => Ok(stat_of(node)),
            None => Err(DriverError::NotFound),
        }
    }
}

pub fn normalize(cwd: &str, path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    let base = if path.starts_with('/') { "" } else { cwd };
    for seg in base.split('/').chain(path.split('/')) {
        match seg {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    if segments.is_empty() {
        "/".to_string()
    } else {
        segments.iter().map(|s| format!("/{s}")).collect()
    }
}

fn server_tls_config() -> ServerConfig {
    let certs = CertificateDer::pem_slice_iter(SERVER_CERT)
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    let key = PrivateKeyDer::from_pem_slice(SERVER_KEY).unwrap();
    let mut config =
        ServerConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
            .with_safe_default_protocol_versions()
            .unwrap()
            .with_no_client_auth()
            .with_single_cert(certs, key)
            .unwrap();
    // upload data connections are never read by the client, unread tickets would reset them
    config.send_tls13_tickets = 0;
    config
}

/// Server behaviors that differ between real world servers.
#[derive(Debug, Clone, Copy)]
pub struct ServerQuirks {
    pub epsv: bool,
    /// close a protected data connection without the TLS handshake if there is nothing to send
    pub close_empty_data_early: bool,
}

impl Default for ServerQuirks {
    fn default() -> Self {
        ServerQuirks {
            epsv: true,
            close_empty_data_early: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerMode {
    Plain,
    Explicit,
    Implicit,
}

/// An FTP server running on a random local port until the runtime stops.
pub struct TestServer {
    pub addr: SocketAddr,
    pub mode: ServerMode,
}

impl TestServer {
    pub async fn start(mode: ServerMode, driver: Arc<dyn FtpDriver>) -> Self {
        TestServer::start_with(mode, true, driver).await
    }

    pub async fn start_with(mode: ServerMode, epsv: bool, driver: Arc<dyn FtpDriver>) -> Self {
        let quirks = ServerQuirks {
            epsv,
            ..Default::default()
        };
        TestServer::start_quirky(mode, quirks, driver).await
    }

    pub async fn start_quirky(
        mode: ServerMode,
        quirks: ServerQuirks,
        driver: Arc<dyn FtpDriver>,
    ) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let acceptor = TlsAcceptor::from(Arc::new(server_tls_config()));

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let conn = ServerConnection::new(mode, quirks, acceptor.clone(), driver.clone());
                tokio::spawn(async move {
                    let _ = conn.run(stream).await;
                });
            }
        });
        TestServer { addr, mode }
    }

    /// Options trusting the server certificate, without credentials.
    pub fn dial_options(&self) -> DialOptions {
        let tls_mode = match self.mode {
            ServerMode::Plain => TlsMode::None,
            ServerMode::Explicit => TlsMode::Explicit,
            ServerMode::Implicit => TlsMode::Implicit,
        };
        DialOptions::new("127.0.0.1", self.addr.port())
            .with_tls_mode(tls_mode)
            .with_tls_config(FtpsTlsConfig::new(
                TlsTrust::from_pem_slice(CA_CERT).unwrap(),
            ))
            .with_allow_unencrypted(self.mode == ServerMode::Plain)
    }
}

async fn reply<W>(w: &mut W, code: u16, msg: &str) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    w.write_all(format!("{code} {msg}\r\n").as_bytes()).await?;
    w.flush().await
}

async fn reply_driver_error<W>(w: &mut W, e: DriverError) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    match e {
        DriverError::NotFound => reply(w, 550, "No such file or directory").await,
        DriverError::Exists => reply(w, 550, "File exists").await,
        DriverError::Denied => reply(w, 550, "Permission denied").await,
    }
}

enum Next {
    Quit,
    Upgrade,
}

struct ServerConnection {
    mode: ServerMode,
    quirks: ServerQuirks,
    acceptor: TlsAcceptor,
    driver: Arc<dyn FtpDriver>,
    tls: bool,
    protect_data: bool,
    username: Option<String>,
    logged_in: bool,
    cwd: String,
    passive: Option<TcpListener>,
    rename_from: Option<String>,
}

impl ServerConnection {
    fn new(
        mode: ServerMode,
        quirks: ServerQuirks,
        acceptor: TlsAcceptor,
        driver: Arc<dyn FtpDriver>,
    ) -> Self {
        ServerConnection {
            mode,
            quirks,
            acceptor,
            driver,
            tls: false,
            protect_data: false,
            username: None,
            logged_in: false,
            cwd: "/".to_string(),
            passive: None,
            rename_from: None,
        }
    }

    async fn run(mut self, stream: TcpStream) -> io::Result<()> {
        if self.mode == ServerMode::Implicit {
            let tls = self.acceptor.accept(stream).await?;
            self.tls = true;
            let mut control = BufReader::new(tls);
            reply(&mut control, 220, "test server ready").await?;
            self.serve(&mut control).await?;
            return Ok(());
        }

        let mut control = BufReader::new(stream);
        control
            .write_all(b"220-welcome to the\r\n220 test server\r\n")
            .await?;
        if let Next::Upgrade = self.serve(&mut control).await? {
            let tls = self.acceptor.accept(control.into_inner()).await?;
            self.tls = true;
            let mut control = BufReader::new(tls);
            self.serve(&mut control).await?;
        }
        Ok(())
    }

    async fn serve<S>(&mut self, control: &mut BufReader<S>) -> io::Result<Next>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut buf = String::new();
        loop {
            buf.clear();
            if control.read_line(&mut buf).await? == 0 {
                return Ok(Next::Quit);
            }
            let line = buf.trim_end_matches(['\r', '\n']);
            let (verb, arg) = match line.split_once(' ') {
                Some((verb, arg)) => (verb.to_ascii_uppercase(), arg.to_string()),
                None => (line.to_ascii_uppercase(), String::new()),
            };

            match verb.as_str() {
                "AUTH" => {
                    if self.mode != ServerMode::Explicit {
                        reply(control, 502, "AUTH not supported").await?;
                    } else if self.tls {
                        reply(control, 503, "already secured").await?;
                    } else if arg.eq_ignore_ascii_case("TLS") {
                        reply(control, 234, "proceed with negotiation").await?;
                        return Ok(Next::Upgrade);
                    } else {
                        reply(control, 504, "unsupported mechanism").await?;
                    }
                }
                "PBSZ" => reply(control, 200, "PBSZ=0").await?,
                "PROT" => match arg.as_str() {
                    "P" if self.tls => {
                        self.protect_data = true;
                        reply(control, 200, "protection level set to P").await?;
                    }
                    "C" => {
                        self.protect_data = false;
                        reply(control, 200, "protection level set to C").await?;
                    }
                    _ => reply(control, 536, "protection level not supported").await?,
                },
                "USER" => {
                    self.username = Some(arg);
                    self.logged_in = false;
                    reply(control, 331, "password required").await?;
                }
                "PASS" => match &self.username {
                    Some(username) if self.driver.authenticate(username, &arg) => {
                        self.logged_in = true;
                        reply(control, 230, "logged in").await?;
                    }
                    Some(_) => reply(control, 530, "login incorrect").await?,
                    None => reply(control, 503, "login with USER first").await?,
                },
                "QUIT" => {
                    reply(control, 221, "goodbye").await?;
                    return Ok(Next::Quit);
                }
                _ if !self.logged_in => reply(control, 530, "please login").await?,
                "TYPE" => reply(control, 200, "type set").await?,
                "PWD" => {
                    let msg = format!("\"{}\" is the current directory", self.cwd.replace('"', "\"\""));
                    reply(control, 257, &msg).await?;
                }
                "CWD" => {
                    let path = normalize(&self.cwd, &arg);
                    match self.driver.stat(&path) {
                        Ok(stat) if stat.is_dir => {
                            self.cwd = path;
                            reply(control, 250, "directory changed").await?;
                        }
                        Ok(_) => reply(control, 550, "not a directory").await?,
                        Err(e) => reply_driver_error(control, e).await?,
                    }
                }
                "MKD" => {
                    let path = normalize(&self.cwd, &arg);
                    match self.driver.make_directory(&path) {
                        Ok(_) => reply(control, 257, &format!("\"{path}\" created")).await?,
                        Err(DriverError::Exists) => {
                            reply(control, 550, "directory already exists").await?
                        }
                        Err(e) => reply_driver_error(control, e).await?,
                    }
                }
                "DELE" => {
                    let path = normalize(&self.cwd, &arg);
                    match self.driver.delete(&path) {
                        Ok(_) => reply(control, 250, "file deleted").await?,
                        Err(e) => reply_driver_error(control, e).await?,
                    }
                }
                "RNFR" => {
                    let path = normalize(&self.cwd, &arg);
                    match self.driver.stat(&path) {
                        Ok(_) => {
                            self.rename_from = Some(path);
                            reply(control, 350, "ready for RNTO").await?;
                        }
                        Err(e) => reply_driver_error(control, e).await?,
                    }
                }
                "RNTO" => match self.rename_from.take() {
                    Some(from) => {
                        let to = normalize(&self.cwd, &arg);
                        match self.driver.rename(&from, &to) {
                            Ok(_) => reply(control, 250, "rename successful").await?,
                            Err(_) => reply(control, 553, "rename failed").await?,
                        }
                    }
                    None => reply(control, 503, "RNFR required first").await?,
                },
                "EPSV" if self.quirks.epsv => {
                    let port = self.bind_passive().await?;
                    let msg = format!("Entering Extended Passive Mode (|||{port}|)");
                    reply(control, 229, &msg).await?;
                }
                "PASV" => {
                    let port = self.bind_passive().await?;
                    let msg = format!(
                        "Entering Passive Mode (127,0,0,1,{},{})",
                        port >> 8,
                        port & 0xff
                    );
                    reply(control, 227, &msg).await?;
                }
                "LIST" => {
                    let dir = normalize(&self.cwd, &arg);
                    match self.driver.list(&dir) {
                        Ok(entries) => {
                            let mut payload = String::new();
                            for (name, stat) in entries {
                                let permissions = if stat.is_dir { "drwxr-xr-x" } else { "-rw-r--r--" };
                                payload.push_str(&format!(
                                    "{permissions}    1 ftp      ftp      {:>8} Jan 02  2023 {name}\r\n",
                                    stat.size
                                ));
                            }
                            self.send_data(control, payload.as_bytes()).await?;
                        }
                        Err(e) => reply_driver_error(control, e).await?,
                    }
                }
                "RETR" => {
                    let path = normalize(&self.cwd, &arg);
                    if path == STALL_PATH {
                        self.stall_data(control).await?;
                        continue;
                    }
                    if path == BROKEN_PATH {
                        self.send_broken_data(control).await?;
                        continue;
                    }
                    match self.driver.read(&path) {
                        Ok(data) => self.send_data(control, &data).await?,
                        Err(e) => reply_driver_error(control, e).await?,
                    }
                }
                "STOR" => {
                    let path = normalize(&self.cwd, &arg);
                    let Some(data) = self.receive_data(control).await? else {
                        continue;
                    };
                    match self.driver.write(&path, data) {
                        Ok(_) => reply(control, 226, "transfer complete").await?,
                        Err(e) => reply_driver_error(control, e).await?,
                    }
                }
                _ => reply(control, 502, "command not implemented").await?,
            }
        }
    }

    async fn bind_passive(&mut self) -> io::Result<u16> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let port = listener.local_addr()?.port();
        self.passive = Some(listener);
        Ok(port)
    }

    async fn accept_data<W>(&mut self, control: &mut W) -> io::Result<Option<TcpStream>>
    where
        W: AsyncWrite + Unpin,
    {
        let Some(listener) = self.passive.take() else {
            reply(control, 425, "use PASV or EPSV first").await?;
            return Ok(None);
        };
        reply(control, 150, "opening data connection").await?;
        match tokio::time::timeout(Duration::from_secs(5), listener.accept()).await {
            Ok(Ok((stream, _))) => Ok(Some(stream)),
            _ => {
                reply(control, 425, "can't open data connection").await?;
                Ok(None)
            }
        }
    }

    async fn send_data<W>(&mut self, control: &mut W, data: &[u8]) -> io::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let Some(stream) = self.accept_data(control).await? else {
            return Ok(());
        };
        if self.protect_data && data.is_empty() && self.quirks.close_empty_data_early {
            let mut stream = stream;
            let _ = stream.shutdown().await;
            // hold the socket until the client gives up on the handshake
            let mut discard = Vec::new();
            let _ = tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut discard))
                .await;
            return reply(control, 226, "transfer complete").await;
        }
        if self.protect_data {
            let mut tls = self.acceptor.accept(stream).await?;
            tls.write_all(data).await?;
            let _ = tls.shutdown().await;
        } else {
            let mut stream = stream;
            stream.write_all(data).await?;
            let _ = stream.shutdown().await;
        }
        reply(control, 226, "transfer complete").await
    }

    async fn receive_data<W>(&mut self, control: &mut W) -> io::Result<Option<Vec<u8>>>
    where
        W: AsyncWrite + Unpin,
    {
        let Some(stream) = self.accept_data(control).await? else {
            return Ok(None);
        };
        let mut data = Vec::new();
        let r = if self.protect_data {
            match self.acceptor.accept(stream).await {
                Ok(mut tls) => tls.read_to_end(&mut data).await,
                Err(e) => Err(e),
            }
        } else {
            let mut stream = stream;
            stream.read_to_end(&mut data).await
        };
        if r.is_err() {
            reply(control, 426, "connection closed; transfer aborted").await?;
            return Ok(None);
        }
        Ok(Some(data))
    }

    async fn send_broken_data<W>(&mut self, control: &mut W) -> io::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let Some(stream) = self.accept_data(control).await? else {
            return Ok(());
        };
        if self.protect_data {
            let mut tls = self.acceptor.accept(stream).await?;
            tls.write_all(BROKEN_CONTENT).await?;
            tls.flush().await?;
            // no close_notify
            drop(tls);
        } else {
            let mut stream = stream;
            stream.write_all(BROKEN_CONTENT).await?;
            drop(stream);
        }
        reply(control, 426, "connection closed; transfer aborted").await
    }

    async fn stall_data<W>(&mut self, control: &mut W) -> io::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        if let Some(_stream) = self.accept_data(control).await? {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        Ok(())
    }
}

/// A server sending `script` as soon as a client connects, then closing.
pub async fn start_scripted(script: &'static [u8]) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            let _ = stream.write_all(script).await;
            let _ = stream.shutdown().await;
        }
    });
    addr
}
