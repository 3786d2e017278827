use std::net::IpAddr;
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use crate::errors::GuardError;

pub const INTERNAL_NETWORK: &str = "Internal Network";
pub const UNKNOWN_LOCATION: &str = "Unknown";

/// Coarse IP geolocation against an ipinfo-style `/{ip}/json` endpoint.
#[derive(Debug, Clone)]
pub struct GeoLocator {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct IpInfo {
    #[serde(default)]
    city: String,
    #[serde(default)]
    region: String,
    #[serde(default)]
    country: String,
}

impl GeoLocator {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, GuardError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GuardError::Network(format!("HTTP client setup failed: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub async fn locate(&self, ip: IpAddr) -> Result<String, GuardError> {
        let resp = self
            .client
            .get(format!("{}/{}/json", self.base_url, ip))
            .send()
            .await
            .map_err(|e| GuardError::Network(format!("Geolocation request failed: {}", e)))?;
        if !resp.status().is_success() {
            return Err(GuardError::Network(format!("Geolocation returned {}", resp.status())));
        }
        let info: IpInfo = resp
            .json()
            .await
            .map_err(|e| GuardError::Network(format!("Geolocation parse error: {}", e)))?;
        Ok(format_location(&info.city, &info.region, &info.country))
    }
}

fn format_location(city: &str, region: &str, country: &str) -> String {
    let parts: Vec<&str> = [city, region, country]
        .into_iter()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    if parts.is_empty() {
        UNKNOWN_LOCATION.to_string()
    } else {
        parts.join(", ")
    }
}

/// Loopback, private, link-local and unique-local addresses never leave
/// the host for a lookup.
pub fn is_internal(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback() || v4.is_private() || v4.is_link_local() || v4.is_unspecified()
        }
        IpAddr::V6(v6) => {
            let first = v6.segments()[0];
            v6.is_loopback()
                || v6.is_unspecified()
                || (first & 0xfe00) == 0xfc00
                || (first & 0xffc0) == 0xfe80
                || v6.to_ipv4_mapped().map(|v4| is_internal(&IpAddr::V4(v4))).unwrap_or(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_internal_ranges() {
        for ip in ["127.0.0.1", "10.1.2.3", "172.16.0.9", "192.168.1.20", "169.254.1.1", "::1", "fd00::1", "fe80::1"] {
            assert!(is_internal(&ip.parse().unwrap()), "{} should be internal", ip);
        }
        for ip in ["8.8.8.8", "17.57.146.20", "2606:4700::1111", "172.32.0.1"] {
            assert!(!is_internal(&ip.parse().unwrap()), "{} should be external", ip);
        }
    }

    #[test]
    fn test_format_location() {
        assert_eq!(format_location("Cupertino", "California", "US"), "Cupertino, California, US");
        assert_eq!(format_location("", "", "DE"), "DE");
        assert_eq!(format_location("", " ", ""), UNKNOWN_LOCATION);
    }
}
