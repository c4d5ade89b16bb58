use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;

/// One of the three storage families the loader caches lookups for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum Family {
    Domains,
    Ips,
    Hosts,
}

/// The external key-value store backing every family. Its contents are
/// opaque text blobs; this crate only knows how to parse them.
#[async_trait::async_trait]
pub trait Kv: Send + Sync {
    async fn get(&self, key: &str) -> Option<String>;
}

fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(idx) => &line[..idx],
        None => line,
    }
}

fn parse_domain_list(input: &str) -> HashSet<String> {
    input
        .lines()
        .map(strip_comment)
        .flat_map(str::split_whitespace)
        .map(str::to_lowercase)
        .collect()
}

fn is_valid_ip_or_cidr(token: &str) -> bool {
    match token.split_once('/') {
        Some((addr, prefix)) => {
            let addr = match IpAddr::from_str(addr) {
                Ok(addr) => addr,
                Err(_) => return false,
            };
            let max_prefix = match addr {
                IpAddr::V4(_) => 32,
                IpAddr::V6(_) => 128,
            };
            prefix
                .parse::<u8>()
                .is_ok_and(|prefix| prefix <= max_prefix)
        }
        None => IpAddr::from_str(token).is_ok(),
    }
}

fn parse_ip_list(input: &str) -> HashSet<String> {
    input
        .lines()
        .map(strip_comment)
        .flat_map(str::split_whitespace)
        .filter(|token| is_valid_ip_or_cidr(token))
        .map(str::to_string)
        .collect()
}

fn parse_hostfile(input: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for line in input.lines() {
        let mut parts = strip_comment(line).split_whitespace();
        let Some(ip) = parts.next() else {
            continue;
        };
        for host in parts {
            map.insert(host.to_lowercase(), ip.to_string());
        }
    }
    map
}

const DEFAULT_TTL: Duration = Duration::from_secs(30 * 60);

#[derive(Clone, Debug)]
pub struct Config {
    pub domains_ttl: Duration,
    pub ips_ttl: Duration,
    pub hosts_ttl: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            domains_ttl: DEFAULT_TTL,
            ips_ttl: DEFAULT_TTL,
            hosts_ttl: DEFAULT_TTL,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    pub domains: u64,
    pub ips: u64,
    pub hosts: u64,
}

/// TTL-cached view over the three storage families held in an external KV.
pub struct Loader {
    kv: Arc<dyn Kv>,
    domains: Cache<String, Arc<HashSet<String>>>,
    ips: Cache<String, Arc<HashSet<String>>>,
    hosts: Cache<String, Arc<HashMap<String, String>>>,
}

impl Loader {
    pub fn new(kv: Arc<dyn Kv>, config: Config) -> Self {
        Self {
            kv,
            domains: Cache::builder().time_to_live(config.domains_ttl).build(),
            ips: Cache::builder().time_to_live(config.ips_ttl).build(),
            hosts: Cache::builder().time_to_live(config.hosts_ttl).build(),
        }
    }

    pub async fn domains(&self, key: &str) -> Arc<HashSet<String>> {
        if let Some(cached) = self.domains.get(key).await {
            return cached;
        }
        let Some(raw) = self.kv.get(key).await else {
            tracing::warn!(key, "kv lookup failed for domain list");
            return Arc::new(HashSet::new());
        };
        let entries = Arc::new(parse_domain_list(&raw));
        self.domains.insert(key.to_string(), entries.clone()).await;
        entries
    }

    pub async fn ips(&self, key: &str) -> Arc<HashSet<String>> {
        if let Some(cached) = self.ips.get(key).await {
            return cached;
        }
        let Some(raw) = self.kv.get(key).await else {
            tracing::warn!(key, "kv lookup failed for ip list");
            return Arc::new(HashSet::new());
        };
        let entries = Arc::new(parse_ip_list(&raw));
        self.ips.insert(key.to_string(), entries.clone()).await;
        entries
    }

    pub async fn hosts(&self, key: &str) -> Arc<HashMap<String, String>> {
        if let Some(cached) = self.hosts.get(key).await {
            return cached;
        }
        let Some(raw) = self.kv.get(key).await else {
            tracing::warn!(key, "kv lookup failed for hosts file");
            return Arc::new(HashMap::new());
        };
        let entries = Arc::new(parse_hostfile(&raw));
        self.hosts.insert(key.to_string(), entries.clone()).await;
        entries
    }

    pub async fn clear_cache(&self, family: Option<Family>) {
        match family {
            Some(Family::Domains) => self.domains.invalidate_all(),
            Some(Family::Ips) => self.ips.invalidate_all(),
            Some(Family::Hosts) => self.hosts.invalidate_all(),
            None => {
                self.domains.invalidate_all();
                self.ips.invalidate_all();
                self.hosts.invalidate_all();
            }
        }
    }

    pub async fn stats(&self) -> Stats {
        self.domains.run_pending_tasks().await;
        self.ips.run_pending_tasks().await;
        self.hosts.run_pending_tasks().await;
        Stats {
            domains: self.domains.entry_count(),
            ips: self.ips.entry_count(),
            hosts: self.hosts.entry_count(),
        }
    }
}

/// In-memory `Kv` double for tests.
#[derive(Debug, Default)]
pub struct MemoryKv {
    entries: std::sync::Mutex<HashMap<String, String>>,
}

impl MemoryKv {
    pub fn new(entries: HashMap<String, String>) -> Self {
        Self {
            entries: std::sync::Mutex::new(entries),
        }
    }
}

#[async_trait::async_trait]
impl Kv for MemoryKv {
    async fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().unwrap().get(key).cloned()
    }
}
