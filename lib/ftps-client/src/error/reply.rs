/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FtpReplyError {
    #[error("read failed: {0:?}")]
    ReadFailed(io::Error),
    #[error("connection closed")]
    ConnectionClosed,
    #[error("connection closed before the terminator of multi-line reply {0}")]
    MissingTerminator(u16),
    #[error("line too long")]
    LineTooLong,
    #[error("invalid line format")]
    InvalidLineFormat,
    #[error("invalid reply code")]
    InvalidReplyCode,
    #[error("too many lines")]
    TooManyLines,
    #[error("read reply for stage '{0}' timed out")]
    ReadReplyTimedOut(&'static str),
}
