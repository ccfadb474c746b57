//! URL normalization and host splitting.
//!
//! Hosts are split into subdomain, registrable label and public suffix the way
//! `tldextract` does it: a host whose suffix is not on the list keeps an empty
//! suffix and its last label becomes the registrable label, and an IPv4 host is
//! kept whole as the label.

use publicsuffix::{List, Psl};
use std::net::Ipv4Addr;
use tracing::debug;
use url::Url;

use crate::error::AppError;

/// Snapshot of the ICANN section of the public suffix list, enough for the
/// common generic and country-code suffixes.
const EMBEDDED_SUFFIX_LIST: &str = include_str!("../data/public_suffix_list.dat");

/// A URL after the default scheme has been applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedUrl {
    /// The URL text with `http://` prepended when no scheme was given.
    pub text: String,
    pub scheme: String,
    /// Lowercased host without port or credentials. When the URL does not
    /// parse this is the raw authority text, so host rules still see it.
    pub host: String,
    pub parsed: Option<Url>,
}

impl NormalizedUrl {
    pub fn new(raw: &str) -> Self {
        let raw = raw.trim();
        let text = if has_http_scheme(raw) {
            raw.to_string()
        } else {
            format!("http://{}", raw)
        };

        match Url::parse(&text) {
            Ok(parsed) => {
                let host = parsed
                    .host_str()
                    .map(|h| h.trim_end_matches('.').to_ascii_lowercase())
                    .unwrap_or_default();
                Self {
                    scheme: parsed.scheme().to_string(),
                    host,
                    parsed: Some(parsed),
                    text,
                }
            }
            Err(e) => {
                debug!("Could not parse URL {:?}: {}", text, e);
                let scheme = text
                    .split_once("://")
                    .map(|(s, _)| s.to_ascii_lowercase())
                    .unwrap_or_else(|| "http".to_string());
                Self {
                    host: raw_authority_host(&text),
                    text,
                    scheme,
                    parsed: None,
                }
            }
        }
    }

    pub fn is_https(&self) -> bool {
        self.scheme == "https"
    }
}

/// Host portion of an unparseable URL: the authority between `://` and the
/// first `/`, `?` or `#`, without userinfo or a numeric port.
fn raw_authority_host(text: &str) -> String {
    let rest = text.split_once("://").map_or(text, |(_, rest)| rest);
    let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
    let host = authority.rsplit_once('@').map_or(authority, |(_, host)| host);
    let host = match host.rsplit_once(':') {
        Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) => name,
        _ => host,
    };
    host.trim_end_matches('.').to_lowercase()
}

fn has_http_scheme(url: &str) -> bool {
    let lower = url.get(..8).unwrap_or(url).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DomainParts {
    pub subdomain: String,
    pub domain: String,
    pub suffix: String,
}

impl DomainParts {
    /// Non-empty parts joined with dots.
    pub fn full(&self) -> String {
        [&self.subdomain, &self.domain, &self.suffix]
            .iter()
            .filter(|part| !part.is_empty())
            .map(|part| part.as_str())
            .collect::<Vec<_>>()
            .join(".")
    }

    pub fn subdomain_count(&self) -> usize {
        // "".split('.') still yields one element
        self.subdomain.split('.').count()
    }
}

pub struct DomainSplitter {
    psl: List,
}

impl DomainSplitter {
    pub fn embedded() -> Result<Self, AppError> {
        let psl: List = EMBEDDED_SUFFIX_LIST.parse()?;
        Ok(Self { psl })
    }

    pub async fn from_file(path: &str) -> Result<Self, AppError> {
        let content = tokio::fs::read_to_string(path).await?;
        let psl: List = content.parse()?;
        debug!("Loaded public suffix list from {}", path);
        Ok(Self { psl })
    }

    pub fn split(&self, host: &str) -> DomainParts {
        if host.is_empty() {
            return DomainParts::default();
        }
        if host.parse::<Ipv4Addr>().is_ok() {
            return DomainParts {
                domain: host.to_string(),
                ..Default::default()
            };
        }

        let suffix = self
            .psl
            .suffix(host.as_bytes())
            .filter(|s| s.is_known())
            .and_then(|s| std::str::from_utf8(s.as_bytes()).ok())
            .map(str::to_string)
            .unwrap_or_default();

        let rest = if suffix.is_empty() {
            host
        } else if host.len() > suffix.len() {
            &host[..host.len() - suffix.len() - 1]
        } else {
            ""
        };

        let (subdomain, domain) = match rest.rsplit_once('.') {
            Some((sub, label)) => (sub.to_string(), label.to_string()),
            None => (String::new(), rest.to_string()),
        };

        DomainParts {
            subdomain,
            domain,
            suffix,
        }
    }
}
