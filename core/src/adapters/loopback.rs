use crate::error::{CoreError, CoreResult};
use url::Host;

/// True when the endpoint URL points at this machine (127.0.0.0/8, ::1 or
/// `localhost`).
pub fn is_loopback_endpoint(endpoint: &str) -> CoreResult<bool> {
    let url = url::Url::parse(endpoint)
        .map_err(|_| CoreError::InvalidInput(format!("invalid endpoint URL: {}", endpoint)))?;
    match url.host() {
        Some(Host::Ipv4(ip)) => Ok(ip.is_loopback()),
        Some(Host::Ipv6(ip)) => Ok(ip.is_loopback()),
        Some(Host::Domain(d)) => Ok(d.eq_ignore_ascii_case("localhost")),
        None => Err(CoreError::InvalidInput(
            "endpoint URL is missing a host".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loopback_hosts() {
        assert!(is_loopback_endpoint("http://127.0.0.1:11434").unwrap());
        assert!(is_loopback_endpoint("http://[::1]:8080/v1").unwrap());
        assert!(is_loopback_endpoint("http://localhost:3000").unwrap());
        assert!(!is_loopback_endpoint("https://api.example.com").unwrap());
        assert!(!is_loopback_endpoint("http://192.168.1.8:11434").unwrap());
        assert!(is_loopback_endpoint("not a url").is_err());
    }
}
