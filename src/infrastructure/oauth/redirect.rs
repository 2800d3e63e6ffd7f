//! Redirect URI policy

use std::net::IpAddr;

use url::{Host, Url};

/// Rules applied to a requested redirect URI
#[derive(Debug, Clone, Copy, Default)]
pub struct RedirectUriPolicy {
    production: bool,
}

impl RedirectUriPolicy {
    pub fn new(production: bool) -> Self {
        Self { production }
    }

    pub fn is_production(&self) -> bool {
        self.production
    }

    /// Exact match against the registered set, no fragment, and https
    /// unless the host is loopback outside production.
    pub fn is_allowed(&self, requested: &str, registered: &[String]) -> bool {
        if !registered.iter().any(|uri| uri == requested) {
            return false;
        }

        let Ok(url) = Url::parse(requested) else {
            return false;
        };

        if url.fragment().is_some() {
            return false;
        }

        match url.scheme() {
            "https" => true,
            "http" => !self.production && is_loopback(&url),
            _ => false,
        }
    }
}

fn is_loopback(url: &Url) -> bool {
    match url.host() {
        Some(Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
        Some(Host::Ipv4(ip)) => IpAddr::V4(ip).is_loopback(),
        Some(Host::Ipv6(ip)) => IpAddr::V6(ip).is_loopback(),
        None => false,
    }
}
