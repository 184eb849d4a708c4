//! Configuration: the typed struct the core consumes (spec's external
//! interface), and the `key value` / `#`-comment text-file reader that
//! populates it. Grounded on the teacher's `load_server_config` line-by-line
//! directive loop, pared down to the keys this crate recognizes.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendFsync {
    Always,
    EverySec,
    No,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind: String,
    pub port: u16,
    pub databases: usize,
    pub appendonly: bool,
    pub appendfilename: String,
    pub appendfsync: AppendFsync,
    pub maxclients: u32,
    pub requirepass: Option<String>,
    pub cluster_self: Option<String>,
    pub cluster_peers: Vec<String>,
    pub cluster_replicas: u32,
    pub dir: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bind: "127.0.0.1".to_string(),
            port: 6379,
            databases: 16,
            appendonly: false,
            appendfilename: "appendonly.aof".to_string(),
            appendfsync: AppendFsync::EverySec,
            maxclients: 10_000,
            requirepass: None,
            cluster_self: None,
            cluster_peers: Vec::new(),
            cluster_replicas: 160,
            dir: ".".to_string(),
        }
    }
}

impl Config {
    /// Whether `self`/`peers` name this process as part of a cluster.
    pub fn cluster_enabled(&self) -> bool {
        self.cluster_self.is_some()
    }

    pub fn load(path: impl AsRef<Path>) -> io::Result<Config> {
        let mut cfg = Config::default();
        let file = File::open(path)?;
        for (line_num, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let mut parts = trimmed.splitn(2, char::is_whitespace);
            let key = parts.next().unwrap_or_default().to_ascii_lowercase();
            let value = parts.next().unwrap_or_default().trim();
            if let Err(e) = cfg.apply(&key, value) {
                crate::log::warning!("ignoring config directive at line {}: {e}", line_num + 1);
            }
        }
        Ok(cfg)
    }

    fn apply(&mut self, key: &str, value: &str) -> Result<(), String> {
        match key {
            "bind" => self.bind = value.to_string(),
            "port" => self.port = value.parse().map_err(|_| "invalid port".to_string())?,
            "databases" => {
                self.databases = value.parse().map_err(|_| "invalid databases".to_string())?
            }
            "appendonly" => self.appendonly = parse_yes_no(value)?,
            "appendfilename" => self.appendfilename = value.to_string(),
            "appendfsync" => {
                self.appendfsync = match value {
                    "always" => AppendFsync::Always,
                    "everysec" => AppendFsync::EverySec,
                    "no" => AppendFsync::No,
                    other => return Err(format!("unknown appendfsync value '{other}'")),
                }
            }
            "maxclients" => {
                self.maxclients = value.parse().map_err(|_| "invalid maxclients".to_string())?
            }
            "requirepass" => self.requirepass = Some(value.to_string()),
            "self" => self.cluster_self = Some(value.to_string()),
            "peers" => {
                self.cluster_peers =
                    value.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect()
            }
            "cluster-replicas" => {
                self.cluster_replicas =
                    value.parse().map_err(|_| "invalid cluster-replicas".to_string())?
            }
            "dir" => self.dir = value.to_string(),
            other => return Err(format!("unknown directive '{other}'")),
        }
        Ok(())
    }
}

fn parse_yes_no(v: &str) -> Result<bool, String> {
    match v.to_ascii_lowercase().as_str() {
        "yes" => Ok(true),
        "no" => Ok(false),
        _ => Err("expected 'yes' or 'no'".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_spec() {
        let cfg = Config::default();
        assert_eq!(cfg.bind, "127.0.0.1");
        assert_eq!(cfg.port, 6379);
        assert_eq!(cfg.databases, 16);
        assert!(!cfg.appendonly);
        assert!(!cfg.cluster_enabled());
    }

    #[test]
    fn loads_recognized_keys_and_skips_comments() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "# a comment\nport 7000\nappendonly yes\nappendfsync always\npeers a:1, b:2").unwrap();
        let cfg = Config::load(f.path()).unwrap();
        assert_eq!(cfg.port, 7000);
        assert!(cfg.appendonly);
        assert_eq!(cfg.appendfsync, AppendFsync::Always);
        assert_eq!(cfg.cluster_peers, vec!["a:1".to_string(), "b:2".to_string()]);
    }

    #[test]
    fn unknown_directive_is_ignored_not_fatal() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "frobnicate 1\nport 7001").unwrap();
        let cfg = Config::load(f.path()).unwrap();
        assert_eq!(cfg.port, 7001);
    }
}
