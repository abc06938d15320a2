/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use super::FtpReply;
use crate::error::FtpReplyError;

struct PendingMultiLine {
    code: u16,
    end_prefix: [u8; 4],
    lines: Vec<String>,
}

/// Incremental reply decoder, fed one physical line at a time.
pub struct FtpReplyParser {
    max_lines: usize,
    pending: Option<PendingMultiLine>,
}

fn trim_eol(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

fn line_text(data: &[u8]) -> String {
    String::from_utf8_lossy(data).trim_end().to_string()
}

fn parse_code(line: &[u8]) -> Result<u16, FtpReplyError> {
    if line.len() < 3 {
        return Err(FtpReplyError::InvalidLineFormat);
    }
    let mut code = 0u16;
    for c in &line[..3] {
        if !c.is_ascii_digit() {
            return Err(FtpReplyError::InvalidReplyCode);
        }
        code = code * 10 + (c - b'0') as u16;
    }
    if !(100..600).contains(&code) {
        return Err(FtpReplyError::InvalidReplyCode);
    }
    Ok(code)
}

impl FtpReplyParser {
    pub fn new(max_lines: usize) -> Self {
        FtpReplyParser {
            max_lines,
            pending: None,
        }
    }

    /// Whether a multi-line reply has been opened but not terminated.
    pub fn in_progress(&self) -> bool {
        self.pending.is_some()
    }

    /// The code of the multi-line reply currently being decoded.
    pub fn pending_code(&self) -> Option<u16> {
        self.pending.as_ref().map(|p| p.code)
    }

    /// Drop any partially decoded reply, returning its code.
    pub fn reset(&mut self) -> Option<u16> {
        self.pending.take().map(|p| p.code)
    }

    /// Feed one line, with or without its line ending.
    ///
    /// Returns the reply once its last line has been seen.
    pub fn feed_line(&mut self, line: &[u8]) -> Result<Option<FtpReply>, FtpReplyError> {
        let line = trim_eol(line);

        if let Some(mut pending) = self.pending.take() {
            if line.starts_with(&pending.end_prefix) || line == &pending.end_prefix[..3] {
                let text = line.get(4..).map(line_text).unwrap_or_default();
                pending.lines.push(text);
                return Ok(Some(FtpReply::new(pending.code, pending.lines)));
            }

            if pending.lines.len() + 1 >= self.max_lines {
                return Err(FtpReplyError::TooManyLines);
            }
            // leading whitespace is part of the message
            pending.lines.push(line_text(line));
            self.pending = Some(pending);
            return Ok(None);
        }

        let code = parse_code(line)?;
        match line.get(3) {
            None => Ok(Some(FtpReply::new(code, vec![String::new()]))),
            Some(b' ') => Ok(Some(FtpReply::new(code, vec![line_text(&line[4..])]))),
            Some(b'-') => {
                let mut lines = Vec::with_capacity(4);
                lines.push(line_text(&line[4..]));
                self.pending = Some(PendingMultiLine {
                    code,
                    end_prefix: [line[0], line[1], line[2], b' '],
                    lines,
                });
                Ok(None)
            }
            Some(_) => Err(FtpReplyError::InvalidLineFormat),
        }
    }

    /// Decode the first complete reply in `data`.
    ///
    /// Returns the reply and the number of bytes it used.
    pub fn parse(data: &[u8], max_lines: usize) -> Result<(FtpReply, usize), FtpReplyError> {
        let mut parser = FtpReplyParser::new(max_lines);
        let mut offset = 0;
        while offset < data.len() {
            let end = match memchr::memchr(b'\n', &data[offset..]) {
                Some(p) => offset + p + 1,
                None => data.len(),
            };
            let line = &data[offset..end];
            offset = end;
            if let Some(reply) = parser.feed_line(line)? {
                return Ok((reply, offset));
            }
        }

        match parser.pending_code() {
            Some(code) => Err(FtpReplyError::MissingTerminator(code)),
            None => Err(FtpReplyError::ConnectionClosed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_line() {
        let (reply, used) = FtpReplyParser::parse(b"220 Service ready\r\n", 16).unwrap();
        assert_eq!(reply.code(), 220);
        assert_eq!(reply.lines(), ["Service ready"]);
        assert_eq!(used, 19);

        let (reply, _) = FtpReplyParser::parse(b"200\r\n", 16).unwrap();
        assert_eq!(reply.code(), 200);
        assert_eq!(reply.text(), "");
    }

    #[test]
    fn multi_line() {
        let data = b"211-Features:\r\n MLST size*;modify*;\r\n211-not the end\r\n UTF8\r\n211 End\r\n";
        let (reply, used) = FtpReplyParser::parse(data, 16).unwrap();
        assert_eq!(reply.code(), 211);
        assert_eq!(
            reply.lines(),
            [
                "Features:",
                " MLST size*;modify*;",
                "211-not the end",
                " UTF8",
                "End"
            ]
        );
        assert_eq!(used, data.len());
    }

    #[test]
    fn multi_line_other_code_inside() {
        let data = b"220-welcome\n230 this is text\n220 done\n";
        let (reply, _) = FtpReplyParser::parse(data, 16).unwrap();
        assert_eq!(reply.code(), 220);
        assert_eq!(reply.lines().len(), 3);
        assert_eq!(reply.lines()[1], "230 this is text");
    }

    #[test]
    fn two_replies_in_buffer() {
        let data = b"150 opening\r\n226 done\r\n";
        let (reply, used) = FtpReplyParser::parse(data, 16).unwrap();
        assert_eq!(reply.code(), 150);
        let (reply, _) = FtpReplyParser::parse(&data[used..], 16).unwrap();
        assert_eq!(reply.code(), 226);
    }

    #[test]
    fn missing_terminator() {
        let data = b"220-welcome\r\n220-still here\r\n";
        let e = FtpReplyParser::parse(data, 16).unwrap_err();
        assert!(matches!(e, FtpReplyError::MissingTerminator(220)));
    }

    #[test]
    fn too_many_lines() {
        let data = b"220-a\r\nb\r\nc\r\nd\r\n220 e\r\n";
        let e = FtpReplyParser::parse(data, 3).unwrap_err();
        assert!(matches!(e, FtpReplyError::TooManyLines));
        assert!(FtpReplyParser::parse(data, 5).is_ok());
    }

    #[test]
    fn invalid() {
        assert!(matches!(
            FtpReplyParser::parse(b"abc hello\r\n", 16).unwrap_err(),
            FtpReplyError::InvalidReplyCode
        ));
        assert!(matches!(
            FtpReplyParser::parse(b"650 hello\r\n", 16).unwrap_err(),
            FtpReplyError::InvalidReplyCode
        ));
        assert!(matches!(
            FtpReplyParser::parse(b"220+hello\r\n", 16).unwrap_err(),
            FtpReplyError::InvalidLineFormat
        ));
        assert!(matches!(
            FtpReplyParser::parse(b"22\r\n", 16).unwrap_err(),
            FtpReplyError::InvalidLineFormat
        ));
    }

    #[test]
    fn lossy_text() {
        let (reply, _) = FtpReplyParser::parse(b"550 caf\xe9 not found\r\n", 16).unwrap();
        assert_eq!(reply.code(), 550);
        assert!(reply.first_line().starts_with("caf"));
    }

    #[test]
    fn incremental() {
        let mut parser = FtpReplyParser::new(8);
        assert!(parser.feed_line(b"230-first\r\n").unwrap().is_none());
        assert!(parser.in_progress());
        assert_eq!(parser.pending_code(), Some(230));
        let reply = parser.feed_line(b"230 last").unwrap().unwrap();
        assert_eq!(reply.lines(), ["first", "last"]);
        assert!(!parser.in_progress());

        assert!(parser.feed_line(b"150-partial\r\n").unwrap().is_none());
        assert_eq!(parser.reset(), Some(150));
        assert_eq!(parser.reset(), None);
        let reply = parser.feed_line(b"226 done\r\n").unwrap().unwrap();
        assert_eq!(reply.code(), 226);
    }
}
