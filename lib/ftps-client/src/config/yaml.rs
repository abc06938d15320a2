/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, anyhow};
use humanize_rs::ParseError;
use humanize_rs::bytes::Bytes;
use yaml_rust::{Yaml, yaml};

use super::{FtpsClientConfig, FtpsControlConfig, FtpsTransferConfig};

fn foreach_kv<F>(table: &yaml::Hash, mut f: F) -> anyhow::Result<()>
where
    F: FnMut(&str, &Yaml) -> anyhow::Result<()>,
{
    for (k, v) in table.iter() {
        if let Yaml::String(key) = k {
            f(key, v).context(format!("failed to parse value of key {key}"))?;
        } else {
            return Err(anyhow!("key in hash should be string"));
        }
    }
    Ok(())
}

fn normalize_key(raw: &str) -> String {
    raw.to_lowercase().replace('-', "_")
}

fn as_usize(v: &Yaml) -> anyhow::Result<usize> {
    match v {
        Yaml::String(value) => {
            let v = value.parse::<Bytes>()?;
            Ok(v.size())
        }
        Yaml::Integer(value) => Ok(usize::try_from(*value)?),
        _ => Err(anyhow!(
            "yaml value type for humanize usize should be 'string' or 'integer'"
        )),
    }
}

fn as_duration(v: &Yaml) -> anyhow::Result<Duration> {
    match v {
        Yaml::String(value) => match humanize_rs::duration::parse(value) {
            Ok(v) => Ok(v),
            Err(ParseError::MissingUnit) => {
                let secs = u64::from_str(value).map_err(|_| anyhow!("invalid duration string"))?;
                Ok(Duration::from_secs(secs))
            }
            Err(e) => Err(anyhow!("invalid humanize duration string: {e}")),
        },
        Yaml::Integer(value) => {
            let secs = u64::try_from(*value).map_err(|_| anyhow!("negative duration"))?;
            Ok(Duration::from_secs(secs))
        }
        _ => Err(anyhow!(
            "yaml value type for humanize duration should be 'string' or 'integer'"
        )),
    }
}

fn as_bool(v: &Yaml) -> anyhow::Result<bool> {
    match v {
        Yaml::Boolean(b) => Ok(*b),
        Yaml::String(s) => match s.to_lowercase().as_str() {
            "on" | "true" | "yes" | "1" => Ok(true),
            "off" | "false" | "no" | "0" => Ok(false),
            _ => Err(anyhow!("invalid bool string value {s}")),
        },
        Yaml::Integer(i) => Ok(*i != 0),
        _ => Err(anyhow!("yaml value type for bool should be 'boolean'")),
    }
}

impl FtpsControlConfig {
    pub fn parse_yaml(value: &Yaml) -> anyhow::Result<Self> {
        if let Yaml::Hash(map) = value {
            let mut config = FtpsControlConfig::default();
            foreach_kv(map, |k, v| match normalize_key(k).as_str() {
                "max_line_len" | "max_line_length" => {
                    config.max_line_len =
                        as_usize(v).context(format!("invalid humanize usize value for key {k}"))?;
                    Ok(())
                }
                "max_multi_lines" => {
                    config.max_multi_lines =
                        as_usize(v).context(format!("invalid usize value for key {k}"))?;
                    Ok(())
                }
                "command_timeout" => {
                    config.command_timeout = as_duration(v)
                        .context(format!("invalid humanize duration value for key {k}"))?;
                    Ok(())
                }
                _ => Err(anyhow!("invalid key {k}")),
            })?;
            if config.max_line_len == 0 {
                return Err(anyhow!("max line length should not be zero"));
            }
            if config.max_multi_lines == 0 {
                return Err(anyhow!("max multi lines should not be zero"));
            }
            Ok(config)
        } else {
            Err(anyhow!("invalid yaml type"))
        }
    }
}

impl FtpsTransferConfig {
    pub fn parse_yaml(value: &Yaml) -> anyhow::Result<Self> {
        if let Yaml::Hash(map) = value {
            let mut config = FtpsTransferConfig::default();
            foreach_kv(map, |k, v| match normalize_key(k).as_str() {
                "buffer_size" => {
                    config.buffer_size =
                        as_usize(v).context(format!("invalid humanize usize value for key {k}"))?;
                    Ok(())
                }
                "idle_timeout" => {
                    config.idle_timeout = as_duration(v)
                        .context(format!("invalid humanize duration value for key {k}"))?;
                    Ok(())
                }
                "end_wait_timeout" => {
                    config.end_wait_timeout = as_duration(v)
                        .context(format!("invalid humanize duration value for key {k}"))?;
                    Ok(())
                }
                "list_max_size" => {
                    config.list_max_size =
                        as_usize(v).context(format!("invalid humanize usize value for key {k}"))?;
                    Ok(())
                }
                _ => Err(anyhow!("invalid key {k}")),
            })?;
            if config.buffer_size == 0 {
                return Err(anyhow!("buffer size should not be zero"));
            }
            Ok(config)
        } else {
            Err(anyhow!("invalid yaml type"))
        }
    }
}

impl FtpsClientConfig {
    pub fn parse_yaml(value: &Yaml) -> anyhow::Result<Self> {
        if let Yaml::Hash(map) = value {
            let mut config = FtpsClientConfig::default();
            foreach_kv(map, |k, v| match normalize_key(k).as_str() {
                "control" => {
                    config.control = FtpsControlConfig::parse_yaml(v)
                        .context(format!("invalid ftps control config value for key {k}"))?;
                    Ok(())
                }
                "transfer" => {
                    config.transfer = FtpsTransferConfig::parse_yaml(v)
                        .context(format!("invalid ftps transfer config value for key {k}"))?;
                    Ok(())
                }
                "connect_timeout" => {
                    config.connect_timeout = as_duration(v)
                        .context(format!("invalid humanize duration value for key {k}"))?;
                    Ok(())
                }
                "tls_handshake_timeout" => {
                    config.tls_handshake_timeout = as_duration(v)
                        .context(format!("invalid humanize duration value for key {k}"))?;
                    Ok(())
                }
                "greeting_timeout" => {
                    config.greeting_timeout = as_duration(v)
                        .context(format!("invalid humanize duration value for key {k}"))?;
                    Ok(())
                }
                "prefer_epsv" => {
                    config.prefer_epsv =
                        as_bool(v).context(format!("invalid bool value for key {k}"))?;
                    Ok(())
                }
                _ => Err(anyhow!("invalid key {k}")),
            })?;
            Ok(config)
        } else {
            Err(anyhow!("invalid yaml type"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use yaml_rust::YamlLoader;

    fn load(s: &str) -> Yaml {
        YamlLoader::load_from_str(s).unwrap().pop().unwrap()
    }

    #[test]
    fn parse_full() {
        let doc = load(
            r#"
            connect-timeout: 5s
            prefer_epsv: false
            control:
              max_line_length: 4KiB
              command_timeout: 1m
            transfer:
              buffer_size: 64KiB
              end_wait_timeout: 3
            "#,
        );
        let config = FtpsClientConfig::parse_yaml(&doc).unwrap();
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert!(!config.prefer_epsv);
        assert_eq!(config.control.max_line_len, 4096);
        assert_eq!(config.control.command_timeout, Duration::from_secs(60));
        assert_eq!(config.control.max_multi_lines, 128);
        assert_eq!(config.transfer.buffer_size, 65536);
        assert_eq!(config.transfer.end_wait_timeout, Duration::from_secs(3));
    }

    #[test]
    fn reject_unknown_key() {
        let doc = load("control:\n  max_lines: 3\n");
        assert!(FtpsClientConfig::parse_yaml(&doc).is_err());

        let doc = load("transfer:\n  buffer_size: 0\n");
        assert!(FtpsClientConfig::parse_yaml(&doc).is_err());

        let doc = load("control:\n  max_line_len: 0\n");
        assert!(FtpsClientConfig::parse_yaml(&doc).is_err());

        let doc = load("control:\n  max_multi_lines: 0\n");
        assert!(FtpsClientConfig::parse_yaml(&doc).is_err());

        let doc = load("- 1\n- 2\n");
        assert!(FtpsClientConfig::parse_yaml(&doc).is_err());
    }
}
