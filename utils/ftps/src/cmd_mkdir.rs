/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use anyhow::anyhow;
use clap::{Arg, ArgMatches, Command};
use tokio_util::sync::CancellationToken;

use ftps_client::FtpsSession;

pub(super) const COMMAND: &str = "mkdir";

const COMMAND_ARG_PATH: &str = "path";

pub(super) fn command() -> Command {
    Command::new(COMMAND).about("Create directory").arg(
        Arg::new(COMMAND_ARG_PATH)
            .value_name("DIR PATH")
            .num_args(1)
            .required(true),
    )
}

pub(super) async fn run(
    session: &mut FtpsSession,
    args: &ArgMatches,
    token: &CancellationToken,
) -> anyhow::Result<()> {
    let path = args
        .get_one::<String>(COMMAND_ARG_PATH)
        .ok_or_else(|| anyhow!("no directory path set"))?;
    session.make_directory(path, token).await?;
    Ok(())
}
