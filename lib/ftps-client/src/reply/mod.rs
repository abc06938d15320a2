/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::fmt;

mod parser;
pub use parser::FtpReplyParser;

mod endpoint;
pub use endpoint::DataEndpoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FtpReplyClass {
    /// 1xx
    Preliminary,
    /// 2xx
    Completion,
    /// 3xx
    Intermediate,
    /// 4xx
    TransientNegative,
    /// 5xx
    PermanentNegative,
}

/// One logical reply read from the control connection.
///
/// `lines` holds the message text of every physical line, the code and
/// separator stripped from the first and the last one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FtpReply {
    code: u16,
    lines: Vec<String>,
}

impl FtpReply {
    pub(crate) fn new(code: u16, lines: Vec<String>) -> Self {
        FtpReply { code, lines }
    }

    #[inline]
    pub fn code(&self) -> u16 {
        self.code
    }

    pub fn class(&self) -> FtpReplyClass {
        match self.code / 100 {
            1 => FtpReplyClass::Preliminary,
            2 => FtpReplyClass::Completion,
            3 => FtpReplyClass::Intermediate,
            4 => FtpReplyClass::TransientNegative,
            _ => FtpReplyClass::PermanentNegative,
        }
    }

    #[inline]
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn first_line(&self) -> &str {
        self.lines.first().map(|s| s.as_str()).unwrap_or_default()
    }

    /// The message text, lines joined by '\n'.
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    #[inline]
    pub fn is_preliminary(&self) -> bool {
        self.class() == FtpReplyClass::Preliminary
    }

    #[inline]
    pub fn is_completion(&self) -> bool {
        self.class() == FtpReplyClass::Completion
    }

    #[inline]
    pub fn is_intermediate(&self) -> bool {
        self.class() == FtpReplyClass::Intermediate
    }

    #[inline]
    pub fn is_negative(&self) -> bool {
        self.code >= 400
    }

    /// Parse the quoted path of a 257 reply, `""` inside the quotes being an escaped quote.
    pub(crate) fn quoted_path(&self) -> Option<String> {
        let line = self.first_line();
        let start = memchr::memchr(b'"', line.as_bytes())?;

        let mut path = String::new();
        let mut chars = line[start + 1..].chars().peekable();
        while let Some(c) = chars.next() {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    path.push('"');
                } else {
                    return Some(path);
                }
            } else {
                path.push(c);
            }
        }
        None
    }
}

impl fmt::Display for FtpReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code, self.text())
    }
}
