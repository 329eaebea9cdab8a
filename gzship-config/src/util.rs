use std::net::{IpAddr, Ipv4Addr, SocketAddr, ToSocketAddrs};
use std::time::Duration;

use url::Url;

/// Parse a duration given either as whole seconds (`"30"`) or in humantime
/// form (`"250ms"`, `"1m 30s"`).
pub fn parse_duration(raw: &str) -> Result<Duration, humantime::DurationError> {
    let trimmed = raw.trim();
    if let Ok(secs) = trimmed.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }
    humantime::parse_duration(trimmed)
}

/// Turn a collector address into the base URL files are PUT under.
///
/// `host:port` becomes `http://host:port/`. An address that already names a
/// scheme is used as given.
pub fn resolve_upload_url(address: &str) -> Result<Url, String> {
    let trimmed = address.trim();
    if trimmed.is_empty() {
        return Err("address is empty".to_string());
    }

    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}/")
    };

    let url = Url::parse(&candidate).map_err(|err| err.to_string())?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!("unsupported scheme '{}'", url.scheme()));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err("address has no host".to_string());
    }
    Ok(url)
}

/// Parse a listen address. A bare `:port` binds every IPv4 interface; any
/// other `host:port` is resolved, preferring an IPv4 result.
pub fn resolve_listen_address(raw: &str) -> Result<SocketAddr, String> {
    let trimmed = raw.trim();
    if let Some(port) = trimmed.strip_prefix(':') {
        let port: u16 = port.parse().map_err(|_| format!("invalid port '{port}'"))?;
        return Ok(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port));
    }
    if let Ok(addr) = trimmed.parse::<SocketAddr>() {
        return Ok(addr);
    }

    let resolved: Vec<SocketAddr> = trimmed
        .to_socket_addrs()
        .map_err(|err| err.to_string())?
        .collect();
    resolved
        .iter()
        .find(|addr| addr.is_ipv4())
        .or_else(|| resolved.first())
        .copied()
        .ok_or_else(|| format!("'{trimmed}' did not resolve to any address"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_accept_seconds_and_humantime() {
        assert_eq!(parse_duration("5").unwrap(), Duration::from_secs(5));
        assert_eq!(parse_duration(" 250ms ").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration("1m 30s").unwrap(), Duration::from_secs(90));
        assert!(parse_duration("soon").is_err());
    }

    #[test]
    fn upload_address_becomes_http_base() {
        let url = resolve_upload_url("localhost:8080").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/");

        let url = resolve_upload_url("10.0.0.7:9000").unwrap();
        assert_eq!(url.as_str(), "http://10.0.0.7:9000/");
    }

    #[test]
    fn upload_address_with_scheme_is_kept() {
        let url = resolve_upload_url("https://collector.example/ingest/").unwrap();
        assert_eq!(url.as_str(), "https://collector.example/ingest/");
    }

    #[test]
    fn bad_upload_addresses_are_rejected() {
        assert!(resolve_upload_url("").is_err());
        assert!(resolve_upload_url("ftp://host/").is_err());
        assert!(resolve_upload_url("host:notaport").is_err());
    }

    #[test]
    fn listen_address_forms() {
        assert_eq!(
            resolve_listen_address(":9211").unwrap(),
            "0.0.0.0:9211".parse::<SocketAddr>().unwrap()
        );
        assert_eq!(
            resolve_listen_address("[::1]:9211").unwrap(),
            "[::1]:9211".parse::<SocketAddr>().unwrap()
        );
        assert!(resolve_listen_address(":http").is_err());
        assert!(resolve_listen_address("nowhere").is_err());
    }

    #[test]
    fn listen_address_hostnames_are_resolved() {
        let addr = resolve_listen_address("localhost:9211").unwrap();
        assert!(addr.ip().is_loopback());
        assert_eq!(addr.port(), 9211);

        assert!(resolve_listen_address("no-such-host.invalid:9211").is_err());
    }
}
