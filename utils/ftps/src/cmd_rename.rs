/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use anyhow::anyhow;
use clap::{Arg, ArgMatches, Command};
use tokio_util::sync::CancellationToken;

use ftps_client::FtpsSession;

pub(super) const COMMAND: &str = "rename";

const COMMAND_ARG_FROM: &str = "from";
const COMMAND_ARG_TO: &str = "to";

pub(super) fn command() -> Command {
    Command::new(COMMAND)
        .about("Rename file")
        .arg(
            Arg::new(COMMAND_ARG_FROM)
                .value_name("FROM PATH")
                .num_args(1)
                .required(true),
        )
        .arg(
            Arg::new(COMMAND_ARG_TO)
                .value_name("TO PATH")
                .num_args(1)
                .required(true),
        )
}

pub(super) async fn run(
    session: &mut FtpsSession,
    args: &ArgMatches,
    token: &CancellationToken,
) -> anyhow::Result<()> {
    let from = args
        .get_one::<String>(COMMAND_ARG_FROM)
        .ok_or_else(|| anyhow!("no source path set"))?;
    let to = args
        .get_one::<String>(COMMAND_ARG_TO)
        .ok_or_else(|| anyhow!("no target path set"))?;
    session.rename_file(from, to, token).await?;
    Ok(())
}
