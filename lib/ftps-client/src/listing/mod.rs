/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use chrono::{Local, NaiveDateTime};

mod time;

const FIXED_FIELDS: usize = 8;

/// One entry of a Unix style `LIST` output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListEntry {
    pub name: String,
    pub is_dir: bool,
    /// meaningless for directories
    pub size: u64,
    pub modify_time: Option<NaiveDateTime>,
    /// target of a symbolic link
    pub link_target: Option<String>,
    pub permissions: String,
}

impl ListEntry {
    #[inline]
    pub fn is_symlink(&self) -> bool {
        self.permissions.starts_with('l')
    }
}

/// Decode a whole `LIST` payload. Lines that can not be decoded are skipped.
pub fn parse_listing(data: &[u8]) -> Vec<ListEntry> {
    parse_listing_at(data, Local::now().naive_local())
}

pub(crate) fn parse_listing_at(data: &[u8], now: NaiveDateTime) -> Vec<ListEntry> {
    let text = String::from_utf8_lossy(data);
    text.split('\n')
        .filter_map(|line| parse_line(line.trim_end_matches('\r'), now))
        .collect()
}

fn split_fields(line: &str) -> Option<([&str; FIXED_FIELDS], &str)> {
    let mut fields = [""; FIXED_FIELDS];
    let mut left = line;
    for field in fields.iter_mut() {
        left = left.trim_start();
        let end = left.find(char::is_whitespace)?;
        *field = &left[..end];
        left = &left[end..];
    }
    let name = left.trim_start();
    if name.is_empty() {
        None
    } else {
        Some((fields, name))
    }
}

fn parse_line(line: &str, now: NaiveDateTime) -> Option<ListEntry> {
    if line.trim().is_empty() || line.starts_with("total ") {
        return None;
    }
    let ([permissions, _links, _owner, _group, size, month, day, time_or_year], name) =
        split_fields(line)?;

    let (name, link_target) = if permissions.starts_with('l') {
        match name.split_once(" -> ") {
            Some((name, target)) => (name, Some(target.to_string())),
            None => (name, None),
        }
    } else {
        (name, None)
    };
    if name == "." || name == ".." {
        return None;
    }

    Some(ListEntry {
        name: name.to_string(),
        is_dir: permissions.starts_with('d'),
        size: size.parse().unwrap_or(0),
        modify_time: time::parse_list_time(month, day, time_or_year, now),
        link_target,
        permissions: permissions.to_string(),
    })
}
