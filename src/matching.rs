//! Domain, pattern and IP matching primitives shared by the built-in plugins.

use std::net::IpAddr;

pub fn normalize_domain(domain: &str) -> String {
    domain.trim_end_matches('.').to_ascii_lowercase()
}

pub fn domain_exact(a: &str, b: &str) -> bool {
    normalize_domain(a) == normalize_domain(b)
}

/// `pattern` may be `*.suffix` (always matches subdomains) or a bare domain,
/// which only matches subdomains when `include_subdomains` is set.
pub fn domain_matches_pattern(query: &str, pattern: &str, include_subdomains: bool) -> bool {
    let query = normalize_domain(query);
    if let Some(suffix) = pattern.strip_prefix("*.") {
        let suffix = normalize_domain(suffix);
        return query.ends_with(&format!(".{suffix}"));
    }
    let pattern = normalize_domain(pattern);
    if query == pattern {
        return true;
    }
    include_subdomains && query.ends_with(&format!(".{pattern}"))
}

/// MosDNS `~` convention: plain substring containment.
pub fn domain_contains(query: &str, substring: &str) -> bool {
    normalize_domain(query).contains(&substring.to_ascii_lowercase())
}

/// Compiles `pattern`, logging and treating the pattern as never-matching on
/// a bad regex instead of failing the whole chain.
pub fn compile_regex(pattern: &str) -> Option<regex::Regex> {
    match regex::Regex::new(pattern) {
        Ok(re) => Some(re),
        Err(err) => {
            tracing::warn!(pattern, %err, "invalid regex pattern, treating as non-match");
            None
        }
    }
}

pub fn domain_matches_regex(query: &str, pattern: &regex::Regex) -> bool {
    pattern.is_match(&normalize_domain(query))
}

pub fn parse_cidr(input: &str) -> Option<(IpAddr, u8)> {
    let (addr, bits) = input.split_once('/')?;
    let ip: IpAddr = addr.trim().parse().ok()?;
    let max_bits = match ip {
        IpAddr::V4(_) => 32,
        IpAddr::V6(_) => 128,
    };
    let bits: u8 = bits.trim().parse().ok()?;
    (bits <= max_bits).then_some((ip, bits))
}

pub fn cidr_contains(cidr: &str, ip: &IpAddr) -> bool {
    let Some((range, bits)) = parse_cidr(cidr) else {
        return false;
    };
    match (range, ip) {
        (IpAddr::V4(range), IpAddr::V4(ip)) => {
            let mask = if bits == 0 { 0 } else { u32::MAX << (32 - bits) };
            (u32::from(range) & mask) == (u32::from(*ip) & mask)
        }
        (IpAddr::V6(range), IpAddr::V6(ip)) => {
            let mask = if bits == 0 { 0u128 } else { u128::MAX << (128 - bits) };
            (u128::from(range) & mask) == (u128::from(*ip) & mask)
        }
        _ => false,
    }
}

pub fn ip_in_range(ip: &IpAddr, start: &IpAddr, end: &IpAddr) -> bool {
    match (ip, start, end) {
        (IpAddr::V4(ip), IpAddr::V4(start), IpAddr::V4(end)) => {
            (u32::from(*start)..=u32::from(*end)).contains(&u32::from(*ip))
        }
        (IpAddr::V6(ip), IpAddr::V6(start), IpAddr::V6(end)) => {
            (u128::from(*start)..=u128::from(*end)).contains(&u128::from(*ip))
        }
        _ => false,
    }
}

/// `entry` is a literal address, a CIDR (`a.b.c.d/n`) or a range (`a-b`).
pub fn ip_matches_entry(ip: &IpAddr, entry: &str) -> bool {
    let entry = entry.trim();
    if let Some((start, end)) = entry.split_once('-') {
        return match (start.trim().parse(), end.trim().parse()) {
            (Ok(start), Ok(end)) => ip_in_range(ip, &start, &end),
            _ => false,
        };
    }
    if entry.contains('/') {
        return cidr_contains(entry, ip);
    }
    entry.parse::<IpAddr>().map(|literal| literal == *ip).unwrap_or(false)
}

pub fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            let ip = IpAddr::V4(*v4);
            cidr_contains("10.0.0.0/8", &ip)
                || cidr_contains("172.16.0.0/12", &ip)
                || cidr_contains("192.168.0.0/16", &ip)
                || cidr_contains("127.0.0.0/8", &ip)
        }
        IpAddr::V6(_) => false,
    }
}
