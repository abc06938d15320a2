/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::path::Path;

use anyhow::{Context, anyhow};
use clap::{Arg, ArgMatches, Command};
use log::info;
use tokio_util::sync::CancellationToken;

use ftps_client::FtpsSession;

pub(super) const COMMAND: &str = "put";

const COMMAND_ARG_LOCAL: &str = "local";
const COMMAND_ARG_REMOTE: &str = "remote";

pub(super) fn command() -> Command {
    Command::new(COMMAND)
        .about("Upload file")
        .arg(
            Arg::new(COMMAND_ARG_LOCAL)
                .help("Local file to read, stdin if -")
                .value_name("LOCAL PATH")
                .num_args(1)
                .required(true),
        )
        .arg(
            Arg::new(COMMAND_ARG_REMOTE)
                .help("Remote path, the local file name by default")
                .value_name("REMOTE PATH")
                .num_args(1),
        )
}

fn remote_path<'a>(local: &'a str, remote: Option<&'a String>) -> anyhow::Result<&'a str> {
    if let Some(remote) = remote {
        return Ok(remote.as_str());
    }
    if local == "-" {
        return Err(anyhow!("remote path is required when uploading from stdin"));
    }
    Path::new(local)
        .file_name()
        .and_then(|s| s.to_str())
        .ok_or_else(|| anyhow!("no file name found in {local}"))
}

pub(super) async fn run(
    session: &mut FtpsSession,
    args: &ArgMatches,
    token: &CancellationToken,
) -> anyhow::Result<()> {
    let local = args
        .get_one::<String>(COMMAND_ARG_LOCAL)
        .ok_or_else(|| anyhow!("no local path set"))?;
    let remote = remote_path(local, args.get_one::<String>(COMMAND_ARG_REMOTE))?;

    let n = if local == "-" {
        let mut stdin = tokio::io::stdin();
        session.upload(remote, &mut stdin, token).await?
    } else {
        let mut file = tokio::fs::File::open(local)
            .await
            .context(format!("failed to open local file {local}"))?;
        session.upload(remote, &mut file, token).await?
    };
    info!("{n} bytes uploaded to {remote}");
    Ok(())
}
