/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use anyhow::{Context, anyhow};
use clap::{Arg, ArgMatches, Command};
use log::info;
use tokio_util::sync::CancellationToken;

use ftps_client::FtpsSession;

pub(super) const COMMAND: &str = "get";

const COMMAND_ARG_REMOTE: &str = "remote";
const COMMAND_ARG_LOCAL: &str = "local";

pub(super) fn command() -> Command {
    Command::new(COMMAND)
        .about("Download file")
        .arg(
            Arg::new(COMMAND_ARG_REMOTE)
                .value_name("REMOTE PATH")
                .num_args(1)
                .required(true),
        )
        .arg(
            Arg::new(COMMAND_ARG_LOCAL)
                .help("Local file to write, stdout if absent or -")
                .value_name("LOCAL PATH")
                .num_args(1),
        )
}

pub(super) async fn run(
    session: &mut FtpsSession,
    args: &ArgMatches,
    token: &CancellationToken,
) -> anyhow::Result<()> {
    let remote = args
        .get_one::<String>(COMMAND_ARG_REMOTE)
        .ok_or_else(|| anyhow!("no remote path set"))?;

    let n = match args.get_one::<String>(COMMAND_ARG_LOCAL) {
        Some(local) if local != "-" => {
            let mut file = tokio::fs::File::create(local)
                .await
                .context(format!("failed to create local file {local}"))?;
            session.download(remote, &mut file, token).await?
        }
        _ => {
            let mut stdout = tokio::io::stdout();
            session.download(remote, &mut stdout, token).await?
        }
    };
    info!("{n} bytes downloaded from {remote}");
    Ok(())
}
