/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

//! Client side bookkeeping of remote paths.
//!
//! The server stays authoritative, these helpers only keep a best effort view.

/// Resolve `path` against the working directory `cwd`.
///
/// `.` and empty segments are dropped, `..` removes the previous segment but
/// never goes above the root. The result is absolute and has no trailing slash
/// except for the root itself.
pub fn resolve(cwd: &str, path: &str) -> String {
    let base = if path.starts_with('/') { "" } else { cwd };

    let mut segments: Vec<&str> = Vec::new();
    for seg in base.split('/').chain(path.split('/')) {
        match seg {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }

    if segments.is_empty() {
        return "/".to_string();
    }
    let len = segments.iter().map(|s| s.len() + 1).sum();
    let mut resolved = String::with_capacity(len);
    for seg in segments {
        resolved.push('/');
        resolved.push_str(seg);
    }
    resolved
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative() {
        assert_eq!(resolve("/", "d1"), "/d1");
        assert_eq!(resolve("/d1", "f1"), "/d1/f1");
        assert_eq!(resolve("/d1/", "./f1"), "/d1/f1");
        assert_eq!(resolve("/d1/d2", "../f1"), "/d1/f1");
        assert_eq!(resolve("/d1", "a//b/"), "/d1/a/b");
    }

    #[test]
    fn absolute() {
        assert_eq!(resolve("/d1", "/d2"), "/d2");
        assert_eq!(resolve("/d1", "/d2/./d3/../f"), "/d2/f");
        assert_eq!(resolve("/d1", "/"), "/");
    }

    #[test]
    fn never_above_root() {
        assert_eq!(resolve("/", ".."), "/");
        assert_eq!(resolve("/d1", "../../.."), "/");
        assert_eq!(resolve("/d1", "../../d2"), "/d2");
    }

    #[test]
    fn empty() {
        assert_eq!(resolve("/d1/d2", ""), "/d1/d2");
        assert_eq!(resolve("", ""), "/");
        assert_eq!(resolve("", "f"), "/f");
    }
}
