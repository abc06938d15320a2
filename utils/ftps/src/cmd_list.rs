/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use clap::{Arg, ArgMatches, Command};
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

use ftps_client::{FtpsSession, ListEntry};

pub(super) const COMMAND: &str = "list";

const COMMAND_ARG_PATH: &str = "path";

pub(super) fn command() -> Command {
    Command::new(COMMAND).about("List directory").arg(
        Arg::new(COMMAND_ARG_PATH)
            .value_name("DIR PATH")
            .num_args(1),
    )
}

fn format_entry(entry: &ListEntry) -> String {
    let mtime = match entry.modify_time {
        Some(dt) => dt.to_string(),
        None => "-".to_string(),
    };
    let mut line = format!(
        "{:<10} {:>12} {:<19} {}",
        entry.permissions, entry.size, mtime, entry.name
    );
    if let Some(target) = &entry.link_target {
        line.push_str(" -> ");
        line.push_str(target);
    }
    line.push('\n');
    line
}

pub(super) async fn run(
    session: &mut FtpsSession,
    args: &ArgMatches,
    token: &CancellationToken,
) -> anyhow::Result<()> {
    let entries = match args.get_one::<String>(COMMAND_ARG_PATH) {
        Some(path) => session.list_path(path, token).await?,
        None => session.list(token).await?,
    };

    let mut stdout = tokio::io::stdout();
    for entry in &entries {
        stdout.write_all(format_entry(entry).as_bytes()).await?;
    }
    stdout.flush().await?;
    Ok(())
}
