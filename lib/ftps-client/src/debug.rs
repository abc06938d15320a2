/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use log::Level;

pub const FTP_DEBUG_LOG_LEVEL: Level = Level::Debug;
pub const FTP_DEBUG_LOG_TARGET: &str = "ftps";

#[cfg(feature = "log-raw-io")]
pub(crate) fn log_cmd(cmd: &str) {
    // never leak credentials into the debug log
    let line = match cmd.split_once(' ') {
        Some((verb, _)) if verb.eq_ignore_ascii_case("PASS") => "PASS ****",
        _ => cmd,
    };
    log::log!(
        target: FTP_DEBUG_LOG_TARGET,
        FTP_DEBUG_LOG_LEVEL,
        "> {line}"
    );
}

#[cfg(feature = "log-raw-io")]
pub(crate) fn log_rsp(rsp: &str) {
    log::log!(
        target: FTP_DEBUG_LOG_TARGET,
        FTP_DEBUG_LOG_LEVEL,
        "< {rsp}"
    );
}
