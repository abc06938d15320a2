/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::io;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use clap::{Arg, ArgAction, ArgMatches, Command, value_parser};
use clap_complete::Shell;
use log::{debug, warn};
use tokio_util::sync::CancellationToken;

use ftps_client::{DialOptions, FtpsClientConfig, FtpsSession, FtpsTlsConfig, TlsMode, TlsTrust};

mod logger;

mod cmd_del;
mod cmd_get;
mod cmd_list;
mod cmd_mkdir;
mod cmd_put;
mod cmd_rename;

const GLOBAL_ARG_COMPLETION: &str = "completion";
const GLOBAL_ARG_SERVER: &str = "server";
const GLOBAL_ARG_USERNAME: &str = "username";
const GLOBAL_ARG_PASSWORD: &str = "password";
const GLOBAL_ARG_TLS: &str = "tls";
const GLOBAL_ARG_ALLOW_UNENCRYPTED: &str = "allow-unencrypted";
const GLOBAL_ARG_INSECURE: &str = "insecure";
const GLOBAL_ARG_CA_CERT: &str = "ca-cert";
const GLOBAL_ARG_SERVER_NAME: &str = "server-name";
const GLOBAL_ARG_SOURCE_IP: &str = "source-ip";
const GLOBAL_ARG_CWD: &str = "cwd";
const GLOBAL_ARG_CONFIG: &str = "config";
const GLOBAL_ARG_VERBOSE: &str = "verbose";

fn build_cli_args() -> Command {
    Command::new("ftps")
        .arg(
            Arg::new(GLOBAL_ARG_COMPLETION)
                .num_args(1)
                .value_name("SHELL")
                .long("completion")
                .value_parser(value_parser!(Shell))
                .exclusive(true),
        )
        .arg(
            Arg::new(GLOBAL_ARG_SERVER)
                .help("FTP server address, as host[:port]")
                .num_args(1)
                .value_name("SERVER ADDRESS")
                .required_unless_present(GLOBAL_ARG_COMPLETION),
        )
        .arg(
            Arg::new(GLOBAL_ARG_USERNAME)
                .help("FTP username, anonymous if not set")
                .num_args(1)
                .value_name("USERNAME")
                .short('u')
                .long("username")
                .global(true),
        )
        .arg(
            Arg::new(GLOBAL_ARG_PASSWORD)
                .help("FTP password")
                .num_args(1)
                .value_name("PASSWORD")
                .short('p')
                .long("password")
                .global(true),
        )
        .arg(
            Arg::new(GLOBAL_ARG_TLS)
                .help("TLS mode")
                .num_args(1)
                .value_name("MODE")
                .long("tls")
                .value_parser(["explicit", "implicit", "none"])
                .default_value("explicit")
                .global(true),
        )
        .arg(
            Arg::new(GLOBAL_ARG_ALLOW_UNENCRYPTED)
                .help("Allow the session to be unencrypted when TLS mode is none")
                .action(ArgAction::SetTrue)
                .long("allow-unencrypted")
                .global(true),
        )
        .arg(
            Arg::new(GLOBAL_ARG_INSECURE)
                .help("Do not verify the server certificate")
                .action(ArgAction::SetTrue)
                .long("insecure")
                .conflicts_with(GLOBAL_ARG_CA_CERT)
                .global(true),
        )
        .arg(
            Arg::new(GLOBAL_ARG_CA_CERT)
                .help("CA certificates in PEM format to verify the server")
                .num_args(1)
                .value_name("CA CERT FILE")
                .value_parser(value_parser!(PathBuf))
                .long("ca-cert")
                .global(true),
        )
        .arg(
            Arg::new(GLOBAL_ARG_SERVER_NAME)
                .help("TLS server name, the server host by default")
                .num_args(1)
                .value_name("NAME")
                .long("server-name")
                .global(true),
        )
        .arg(
            Arg::new(GLOBAL_ARG_SOURCE_IP)
                .help("source ip address")
                .num_args(1)
                .value_name("IP ADDRESS")
                .value_parser(value_parser!(IpAddr))
                .long("source")
                .short('s')
                .global(true),
        )
        .arg(
            Arg::new(GLOBAL_ARG_CWD)
                .help("Change to this remote directory first")
                .num_args(1)
                .value_name("DIR")
                .long("cwd")
                .global(true),
        )
        .arg(
            Arg::new(GLOBAL_ARG_CONFIG)
                .help("Client config file in YAML format")
                .num_args(1)
                .value_name("CONFIG FILE")
                .value_parser(value_parser!(PathBuf))
                .long("config")
                .short('c')
                .global(true),
        )
        .arg(
            Arg::new(GLOBAL_ARG_VERBOSE)
                .help("show verbose message")
                .num_args(0)
                .action(ArgAction::Count)
                .short('v')
                .global(true),
        )
        .subcommand(cmd_list::command())
        .subcommand(cmd_get::command())
        .subcommand(cmd_put::command())
        .subcommand(cmd_del::command())
        .subcommand(cmd_mkdir::command())
        .subcommand(cmd_rename::command())
}

/// Split `host[:port]`, with IPv6 addresses either bare or in brackets.
fn parse_server(s: &str) -> anyhow::Result<(String, Option<u16>)> {
    if let Some(left) = s.strip_prefix('[') {
        let (host, left) = left
            .split_once(']')
            .ok_or_else(|| anyhow!("no closing bracket in server address {s}"))?;
        let port = match left.strip_prefix(':') {
            Some(port) => Some(parse_port(port)?),
            None if left.is_empty() => None,
            None => return Err(anyhow!("invalid server address {s}")),
        };
        return Ok((host.to_string(), port));
    }

    match s.rsplit_once(':') {
        Some((host, port)) if !host.contains(':') => Ok((host.to_string(), Some(parse_port(port)?))),
        _ => Ok((s.to_string(), None)),
    }
}

fn parse_port(s: &str) -> anyhow::Result<u16> {
    s.parse::<u16>()
        .map_err(|e| anyhow!("invalid port {s}: {e}"))
}

fn load_config(path: &Path) -> anyhow::Result<FtpsClientConfig> {
    let content = std::fs::read_to_string(path)
        .context(format!("failed to read config file {}", path.display()))?;
    let docs = yaml_rust::YamlLoader::load_from_str(&content)
        .context(format!("invalid yaml file {}", path.display()))?;
    match docs.first() {
        Some(doc) => FtpsClientConfig::parse_yaml(doc)
            .context(format!("invalid client config in {}", path.display())),
        None => Ok(FtpsClientConfig::default()),
    }
}

fn build_dial_options(args: &ArgMatches) -> anyhow::Result<DialOptions> {
    let tls_mode = match args.get_one::<String>(GLOBAL_ARG_TLS).map(|s| s.as_str()) {
        Some("implicit") => TlsMode::Implicit,
        Some("none") => TlsMode::None,
        _ => TlsMode::Explicit,
    };

    let server = args
        .get_one::<String>(GLOBAL_ARG_SERVER)
        .ok_or_else(|| anyhow!("no server address set"))?;
    let (host, port) = parse_server(server)?;
    let port = port.unwrap_or_else(|| tls_mode.default_port());

    let trust = if args.get_flag(GLOBAL_ARG_INSECURE) {
        TlsTrust::InsecureSkipVerify
    } else if let Some(path) = args.get_one::<PathBuf>(GLOBAL_ARG_CA_CERT) {
        TlsTrust::from_pem_file(path)?
    } else {
        TlsTrust::WebPki
    };
    let mut tls_config = FtpsTlsConfig::new(trust);
    if let Some(name) = args.get_one::<String>(GLOBAL_ARG_SERVER_NAME) {
        tls_config = tls_config.with_server_name(name);
    }

    let username = args
        .get_one::<String>(GLOBAL_ARG_USERNAME)
        .cloned()
        .unwrap_or_default();
    let password = args
        .get_one::<String>(GLOBAL_ARG_PASSWORD)
        .cloned()
        .unwrap_or_default();

    let mut options = DialOptions::new(host, port)
        .with_credentials(username, password)
        .with_tls_mode(tls_mode)
        .with_tls_config(tls_config)
        .with_allow_unencrypted(args.get_flag(GLOBAL_ARG_ALLOW_UNENCRYPTED));
    if let Some(ip) = args.get_one::<IpAddr>(GLOBAL_ARG_SOURCE_IP) {
        options = options.with_bind_ip(*ip);
    }
    if let Some(path) = args.get_one::<PathBuf>(GLOBAL_ARG_CONFIG) {
        options = options.with_client_config(load_config(path)?);
    }
    Ok(options)
}

async fn run_subcommand(
    session: &mut FtpsSession,
    args: &ArgMatches,
    token: &CancellationToken,
) -> anyhow::Result<()> {
    if let Some(dir) = args.get_one::<String>(GLOBAL_ARG_CWD) {
        session.change_directory(dir, token).await?;
    }

    match args.subcommand() {
        Some((cmd_list::COMMAND, sub_args)) => cmd_list::run(session, sub_args, token).await,
        Some((cmd_get::COMMAND, sub_args)) => cmd_get::run(session, sub_args, token).await,
        Some((cmd_put::COMMAND, sub_args)) => cmd_put::run(session, sub_args, token).await,
        Some((cmd_del::COMMAND, sub_args)) => cmd_del::run(session, sub_args, token).await,
        Some((cmd_mkdir::COMMAND, sub_args)) => cmd_mkdir::run(session, sub_args, token).await,
        Some((cmd_rename::COMMAND, sub_args)) => cmd_rename::run(session, sub_args, token).await,
        Some((cmd, _)) => Err(anyhow!("invalid subcommand {cmd}")),
        None => Err(anyhow!("no subcommand found")),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = build_cli_args().get_matches();

    if let Some(target) = args.get_one::<Shell>(GLOBAL_ARG_COMPLETION) {
        let mut app = build_cli_args();
        let bin_name = app.get_name().to_string();
        clap_complete::generate(*target, &mut app, bin_name, &mut io::stdout());
        return Ok(());
    }

    let verbose_level = args
        .get_one::<u8>(GLOBAL_ARG_VERBOSE)
        .copied()
        .unwrap_or_default();
    logger::setup(verbose_level);

    let options = build_dial_options(&args)?;
    if args.subcommand().is_none() {
        return Err(anyhow!("no subcommand found"));
    }

    let token = CancellationToken::new();
    let signal_token = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling");
            signal_token.cancel();
        }
    });

    let mut session = FtpsSession::dial(&options, &token).await?;
    debug!(
        "session established, encrypted: {}, cwd: {}",
        session.is_encrypted(),
        session.current_directory()
    );

    let ret = run_subcommand(&mut session, &args, &token).await;
    let close_ret = session.close(&token).await;
    ret?;
    close_ret?;
    Ok(())
}
