/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::io;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};

/// Read into `buf` until `delimiter` (included) or until `max_len` bytes are read.
///
/// Returns whether the delimiter was found and the number of bytes appended.
/// A zero length means EOF.
pub(crate) async fn limited_read_until<R>(
    reader: &mut R,
    delimiter: u8,
    max_len: usize,
    buf: &mut Vec<u8>,
) -> io::Result<(bool, usize)>
where
    R: AsyncBufRead + Unpin + ?Sized,
{
    let mut total = 0;
    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            return Ok((false, total));
        }

        let left = max_len - total;
        let (found, used) = match memchr::memchr(delimiter, available) {
            Some(i) if i < left => (true, i + 1),
            _ => (false, available.len().min(left)),
        };
        buf.extend_from_slice(&available[..used]);
        reader.consume(used);
        total += used;

        if found || total >= max_len {
            return Ok((found, total));
        }
    }
}
