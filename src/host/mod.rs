//! Hostname -> tenant classification.
//!
//! Pure string handling: no I/O, no caching. Every call classifies the host it
//! is given from scratch.

pub mod middleware;

use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, Ipv6Addr};

pub use middleware::{host_routing_middleware, route_prefix, HostRouting};

/// Which part of the platform a hostname addresses
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TenantKind {
    /// Root marketing domain
    Apex,
    /// Platform admin console
    Admin,
    /// A single tenant's branded subdomain
    Center { slug: String },
    Unknown,
}

impl TenantKind {
    pub fn center_slug(&self) -> Option<&str> {
        match self {
            TenantKind::Center { slug } => Some(slug),
            _ => None,
        }
    }

    pub fn is_center(&self) -> bool {
        matches!(self, TenantKind::Center { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            TenantKind::Apex => "apex",
            TenantKind::Admin => "admin",
            TenantKind::Center { .. } => "center",
            TenantKind::Unknown => "unknown",
        }
    }
}

/// Classify a raw `Host` / `X-Forwarded-Host` value against the configured app domain.
pub fn classify(host_header: &str, app_domain: Option<&str>) -> TenantKind {
    let host = match normalize_host(host_header) {
        NormalizedHost::Literal => return TenantKind::Admin,
        NormalizedHost::Name(host) => host,
        NormalizedHost::Empty => return TenantKind::Unknown,
    };

    if is_local(&host) {
        return TenantKind::Admin;
    }

    match app_domain.and_then(canonical_domain) {
        Some(apex) => classify_against_apex(&host, &apex),
        None => classify_by_labels(&host),
    }
}

enum NormalizedHost {
    Name(String),
    /// Bracketed or bare IP literal
    Literal,
    Empty,
}

/// First proxy-chain entry, lowercased, without port or trailing dot.
fn normalize_host(raw: &str) -> NormalizedHost {
    let first = raw.split(',').next().unwrap_or("").trim();
    if first.is_empty() {
        return NormalizedHost::Empty;
    }

    // [::1]:3000
    if let Some(rest) = first.strip_prefix('[') {
        return match rest.split_once(']') {
            Some((inner, _)) if inner.parse::<Ipv6Addr>().is_ok() => NormalizedHost::Literal,
            _ => NormalizedHost::Empty,
        };
    }

    // Bare IPv6 cannot carry a port without brackets
    if first.matches(':').count() > 1 {
        return if first.parse::<Ipv6Addr>().is_ok() {
            NormalizedHost::Literal
        } else {
            NormalizedHost::Empty
        };
    }

    let name = first.split(':').next().unwrap_or("");
    let name = name.trim_end_matches('.').to_ascii_lowercase();
    if name.is_empty() {
        return NormalizedHost::Empty;
    }
    if name.parse::<Ipv4Addr>().is_ok() {
        return NormalizedHost::Literal;
    }

    NormalizedHost::Name(name)
}

fn is_local(host: &str) -> bool {
    host == "localhost" || host.ends_with(".localhost")
}

/// Reduce a configured domain such as `https://www.example.com/` to `example.com`.
fn canonical_domain(configured: &str) -> Option<String> {
    let mut domain = configured.trim().to_ascii_lowercase();
    for scheme in ["https://", "http://"] {
        if let Some(rest) = domain.strip_prefix(scheme) {
            domain = rest.to_string();
        }
    }

    let domain = domain.split('/').next().unwrap_or("");
    let domain = domain.split(':').next().unwrap_or("");
    let domain = domain.trim_start_matches('.').trim_end_matches('.');
    let domain = domain.strip_prefix("www.").unwrap_or(domain);

    if domain.is_empty() {
        None
    } else {
        Some(domain.to_string())
    }
}

fn classify_against_apex(host: &str, apex: &str) -> TenantKind {
    if host == apex {
        return TenantKind::Apex;
    }

    let Some(subdomain) = host
        .strip_suffix(apex)
        .and_then(|prefix| prefix.strip_suffix('.'))
    else {
        return TenantKind::Unknown;
    };

    match subdomain {
        "www" => TenantKind::Apex,
        "admin" => TenantKind::Admin,
        label if is_single_label(label) => TenantKind::Center {
            slug: label.to_string(),
        },
        _ => TenantKind::Unknown,
    }
}

fn classify_by_labels(host: &str) -> TenantKind {
    let labels: Vec<&str> = host.split('.').collect();
    if labels.iter().any(|label| label.is_empty()) {
        return TenantKind::Unknown;
    }

    match labels.as_slice() {
        [_, _] => TenantKind::Apex,
        [first, _, _, ..] => match *first {
            "admin" => TenantKind::Admin,
            "www" => TenantKind::Apex,
            slug => TenantKind::Center {
                slug: slug.to_string(),
            },
        },
        _ => TenantKind::Unknown,
    }
}

fn is_single_label(label: &str) -> bool {
    !label.is_empty() && !label.contains('.')
}

#[cfg(test)]
mod tests {
    use super::*;

    const APEX: Option<&str> = Some("example.com");

    fn center(slug: &str) -> TenantKind {
        TenantKind::Center {
            slug: slug.to_string(),
        }
    }

    #[test]
    fn test_configured_apex_variants() {
        assert_eq!(classify("admin.example.com", APEX), TenantKind::Admin);
        assert_eq!(classify("example.com", APEX), TenantKind::Apex);
        assert_eq!(classify("www.example.com", APEX), TenantKind::Apex);
    }

    #[test]
    fn test_single_label_subdomains_are_centers() {
        for slug in ["center-01", "acme", "a", "www2", "admins", "x1y2"] {
            let host = format!("{}.example.com", slug);
            assert_eq!(classify(&host, APEX), center(slug), "host {}", host);
        }
    }

    #[test]
    fn test_multi_label_and_foreign_hosts_are_unknown() {
        assert_eq!(classify("a.b.example.com", APEX), TenantKind::Unknown);
        assert_eq!(classify("example.org", APEX), TenantKind::Unknown);
        assert_eq!(classify("notexample.com", APEX), TenantKind::Unknown);
        assert_eq!(classify("", APEX), TenantKind::Unknown);
    }

    #[test]
    fn test_local_hosts_are_admin() {
        for apex in [None, APEX] {
            assert_eq!(classify("localhost:3000", apex), TenantKind::Admin);
            assert_eq!(classify("center-01.localhost", apex), TenantKind::Admin);
            assert_eq!(classify("127.0.0.1:8080", apex), TenantKind::Admin);
            assert_eq!(classify("[::1]:3000", apex), TenantKind::Admin);
            assert_eq!(classify("::1", apex), TenantKind::Admin);
        }
    }

    #[test]
    fn test_header_normalization() {
        assert_eq!(classify("Acme.Example.COM:443", APEX), center("acme"));
        assert_eq!(classify("acme.example.com, proxy.internal", APEX), center("acme"));
        assert_eq!(classify(" admin.example.com. ", APEX), TenantKind::Admin);
    }

    #[test]
    fn test_configured_domain_is_canonicalized() {
        for configured in ["https://www.example.com/", ".example.com", "www.example.com", "EXAMPLE.com:443"] {
            assert_eq!(classify("acme.example.com", Some(configured)), center("acme"));
            assert_eq!(classify("example.com", Some(configured)), TenantKind::Apex);
        }
        // Blank config behaves like no config
        assert_eq!(classify("acme.example.com", Some("  ")), center("acme"));
    }

    #[test]
    fn test_structural_fallback_without_domain() {
        assert_eq!(classify("example.com", None), TenantKind::Apex);
        assert_eq!(classify("admin.example.com", None), TenantKind::Admin);
        assert_eq!(classify("www.example.com", None), TenantKind::Apex);
        assert_eq!(classify("acme.example.com", None), center("acme"));
        assert_eq!(classify("intranet", None), TenantKind::Unknown);
    }

    #[test]
    fn test_kind_serializes_with_tag() {
        let value = serde_json::to_value(center("acme")).unwrap();
        assert_eq!(value, serde_json::json!({"kind": "center", "slug": "acme"}));
        assert_eq!(center("acme").center_slug(), Some("acme"));
        assert_eq!(TenantKind::Admin.center_slug(), None);
    }
}
