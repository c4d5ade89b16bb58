use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

#[derive(Debug, serde::Deserialize)]
pub struct Config {
    #[serde(default = "Config::default_host")]
    pub host: IpAddr,
    #[serde(default = "Config::default_port")]
    pub port: u16,
    #[serde(default = "Config::default_cache_capacity")]
    pub cache_capacity: u64,
    #[serde(default = "Config::default_loader_ttl_secs")]
    pub loader_ttl_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            port: Self::default_port(),
            cache_capacity: Self::default_cache_capacity(),
            loader_ttl_secs: Self::default_loader_ttl_secs(),
        }
    }
}

impl Config {
    fn default_host() -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0))
    }

    fn default_port() -> u16 {
        8053
    }

    fn default_cache_capacity() -> u64 {
        10_000
    }

    fn default_loader_ttl_secs() -> u64 {
        30 * 60
    }
}

impl Config {
    pub fn address(&self) -> SocketAddr {
        SocketAddr::from((self.host, self.port))
    }

    pub fn loader_config(&self) -> doh_loader::Config {
        let ttl = Duration::from_secs(self.loader_ttl_secs);
        doh_loader::Config {
            domains_ttl: ttl,
            ips_ttl: ttl,
            hosts_ttl: ttl,
        }
    }
}
