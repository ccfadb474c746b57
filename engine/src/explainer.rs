use regex::Regex;
use std::sync::Arc;

use crate::{
    domain::{DomainSplitter, NormalizedUrl},
    error::{internal_error, AppError},
};

const SUSPICIOUS_KEYWORDS: [&str; 8] = [
    "paypal", "amazon", "bank", "login", "update", "secure", "account", "verify",
];

const SUSPICIOUS_TLDS: [&str; 6] = ["ru", "cn", "tk", "ml", "ga", "cf"];

const MAX_DOMAIN_LENGTH: usize = 30;
const MAX_SUBDOMAINS: usize = 2;

/// Pattern checks over a URL, independent of the model. Output order follows
/// the rule order and is stable for a given URL.
pub struct Explainer {
    splitter: Arc<DomainSplitter>,
    ip_host: Regex,
}

impl Explainer {
    pub fn new(splitter: Arc<DomainSplitter>) -> Result<Self, AppError> {
        let ip_host = Regex::new(r"^\d{1,3}(\.\d{1,3}){3}$")
            .map_err(|e| internal_error(&format!("bad IP pattern: {}", e)))?;
        Ok(Self { splitter, ip_host })
    }

    pub fn explain(&self, raw_url: &str) -> Vec<String> {
        let raw_url = raw_url.trim();
        let url = NormalizedUrl::new(raw_url);
        let parts = self.splitter.split(&url.host);
        let url_lower = raw_url.to_lowercase();
        let mut reasons = Vec::new();

        if raw_url.contains('@') {
            reasons.push("Contains '@' symbol: can hide the real destination domain.".to_string());
        }

        if self.ip_host.is_match(&url.host) {
            reasons.push("Uses raw IP address instead of domain name.".to_string());
        }

        let keywords: Vec<&str> = SUSPICIOUS_KEYWORDS
            .iter()
            .copied()
            .filter(|k| url_lower.contains(k))
            .collect();
        if !keywords.is_empty() {
            reasons.push(format!(
                "Contains brand/keyword commonly used in phishing: {}",
                keywords.join(", ")
            ));
        }

        if parts.full().chars().count() > MAX_DOMAIN_LENGTH {
            reasons.push("Domain is unusually long.".to_string());
        }

        if parts.subdomain_count() > MAX_SUBDOMAINS {
            reasons.push("Contains many subdomains: may be hiding the true domain.".to_string());
        }

        if SUSPICIOUS_TLDS.contains(&parts.suffix.to_lowercase().as_str()) {
            reasons.push(format!("Uses suspicious top-level domain: .{}", parts.suffix));
        }

        if parts.domain.contains('-') {
            reasons.push("Domain contains hyphen: often used in fake sites.".to_string());
        }

        if !url.is_https() {
            reasons.push("Does not use HTTPS: less secure.".to_string());
        }

        reasons
    }
}
