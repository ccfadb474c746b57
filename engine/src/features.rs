use difflib::sequencematcher::SequenceMatcher;
use std::sync::Arc;
use tracing::debug;

use crate::{
    config::Config,
    domain::{DomainSplitter, NormalizedUrl},
    error::AppError,
    page::{PageFetcher, PageParser, PageSignals},
    types::{flag, FeatureRecord},
};

pub struct FeatureExtractor {
    splitter: Arc<DomainSplitter>,
    fetcher: PageFetcher,
    parser: PageParser,
}

impl FeatureExtractor {
    pub fn new(config: &Config, splitter: Arc<DomainSplitter>) -> Result<Self, AppError> {
        Ok(Self {
            splitter,
            fetcher: PageFetcher::new(config.fetch_timeout(), &config.user_agent)?,
            parser: PageParser::new()?,
        })
    }

    /// Builds the feature record for `raw_url`. Never fails: an unreachable or
    /// unparseable page leaves the markup-derived fields at zero.
    pub async fn extract(&self, raw_url: &str) -> FeatureRecord {
        let url = NormalizedUrl::new(raw_url);
        let html = self.fetch_page(&url).await;
        self.build_record(&url, &self.parser.parse(&html))
    }

    async fn fetch_page(&self, url: &NormalizedUrl) -> String {
        let Some(parsed) = &url.parsed else {
            return String::new();
        };
        match self.fetcher.fetch(parsed).await {
            Ok(body) => body,
            Err(e) => {
                debug!("Page fetch failed for {}: {}", url.text, e);
                metrics::counter!("page_fetch_failures_total").increment(1);
                String::new()
            }
        }
    }

    fn build_record(&self, url: &NormalizedUrl, page: &PageSignals) -> FeatureRecord {
        let parts = self.splitter.split(&url.host);
        let text = url.text.as_str();
        let url_lower = text.to_lowercase();
        let title_lower = page.title.to_lowercase();
        let has_title = !page.title.is_empty();

        let (domain_title_match_score, url_title_match_score) = if has_title {
            (
                match_ratio(&parts.domain.to_lowercase(), &title_lower),
                match_ratio(&url_lower, &title_lower),
            )
        } else {
            (0.0, 0.0)
        };

        FeatureRecord {
            url: 0.0,
            domain: 0.0,
            url_similarity_index: match_ratio(&url_lower, &parts.full().to_lowercase()),
            char_continuation_rate: longest_char_run(text) as f64,
            url_char_prob: uniform_char_prob(text),
            is_https: flag(url.is_https()),
            has_title: flag(has_title),
            domain_title_match_score,
            url_title_match_score,
            has_favicon: flag(page.has_favicon),
            is_responsive: 0.0,
            has_description: flag(page.has_description),
            has_social_net: flag(page.has_social_net),
            has_submit_button: flag(page.has_submit_button),
            has_hidden_fields: flag(page.has_hidden_fields),
            has_copyright_info: flag(page.has_copyright_info),
            digit_ratio: char_ratio(text, |c| c.is_ascii_digit()),
            special_char_ratio: char_ratio(text, |c| !c.is_alphanumeric()),
        }
    }
}

/// Ratio of matching characters between `a` and `b`, `2 * M / (|a| + |b|)`,
/// where `M` counts the characters in Ratcliff/Obershelp matching blocks
/// (longest common block first, then recursively either side of it).
/// Two empty strings are a perfect match.
pub fn match_ratio(a: &str, b: &str) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    SequenceMatcher::new(&a[..], &b[..]).ratio() as f64
}

fn char_ratio(text: &str, predicate: impl Fn(char) -> bool) -> f64 {
    let total = text.chars().count();
    if total == 0 {
        return 0.0;
    }
    text.chars().filter(|c| predicate(*c)).count() as f64 / total as f64
}

/// Length of the longest run of one repeated character.
fn longest_char_run(text: &str) -> usize {
    let mut longest = 0;
    let mut current = 0;
    let mut previous = None;

    for ch in text.chars() {
        if Some(ch) == previous {
            current += 1;
        } else {
            current = 1;
            previous = Some(ch);
        }
        longest = longest.max(current);
    }

    longest
}

// Stand-in for a per-character probability table: every character weighs 1/256.
fn uniform_char_prob(text: &str) -> f64 {
    if text.is_empty() {
        0.0
    } else {
        1.0 / 256.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method, MockServer};

    fn extractor() -> FeatureExtractor {
        let config = Config {
            fetch_timeout_secs: 2,
            ..Default::default()
        };
        FeatureExtractor::new(&config, Arc::new(DomainSplitter::embedded().unwrap())).unwrap()
    }

    fn assert_in_ranges(record: &FeatureRecord) {
        let ratios = [
            record.url_similarity_index,
            record.url_char_prob,
            record.domain_title_match_score,
            record.url_title_match_score,
            record.digit_ratio,
            record.special_char_ratio,
        ];
        for value in ratios {
            assert!((0.0..=1.0).contains(&value), "ratio out of range: {}", value);
        }
        let flags = [
            record.url,
            record.domain,
            record.is_https,
            record.has_title,
            record.has_favicon,
            record.is_responsive,
            record.has_description,
            record.has_social_net,
            record.has_submit_button,
            record.has_hidden_fields,
            record.has_copyright_info,
        ];
        for value in flags {
            assert!(value == 0.0 || value == 1.0, "flag not boolean: {}", value);
        }
        assert!(record.char_continuation_rate >= 0.0);
    }

    #[test]
    fn test_match_ratio() {
        assert_eq!(match_ratio("abcd", "abcd"), 1.0);
        assert_eq!(match_ratio("abc", "xyz"), 0.0);
        assert_eq!(match_ratio("", ""), 1.0);
        assert!((match_ratio("abcd", "bcde") - 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_match_ratio_takes_longest_block_first() {
        // "qq" is the longest block; nothing is left on either side of it
        assert!((match_ratio("a1b2c3qq", "qqabc") - 4.0 / 13.0).abs() < 1e-4);
        assert!((match_ratio("qqabc", "a1b2c3qq") - 4.0 / 13.0).abs() < 1e-4);
        let url_title = match_ratio("http://secure-paypal.com/login", "paypal login secure");
        assert!((url_title - 14.0 / 49.0).abs() < 1e-4);
        assert!((match_ratio("abxcd", "abcd") - 8.0 / 9.0).abs() < 1e-4);
    }

    #[test]
    fn test_longest_char_run() {
        assert_eq!(longest_char_run(""), 0);
        assert_eq!(longest_char_run("abc"), 1);
        assert_eq!(longest_char_run("http://www.google.com"), 3);
        assert_eq!(longest_char_run("aabbbbc"), 4);
    }

    #[test]
    fn test_char_ratios() {
        assert_eq!(char_ratio("", |c| c.is_ascii_digit()), 0.0);
        assert_eq!(char_ratio("a1b2", |c| c.is_ascii_digit()), 0.5);
        assert_eq!(char_ratio("ab/:", |c| !c.is_alphanumeric()), 0.5);
    }

    #[test]
    fn test_digit_ratio_counts_ascii_digits_only() {
        let record = extractor().build_record(
            &NormalizedUrl::new("http://a.com/\u{bd}1"),
            &PageSignals::default(),
        );
        assert!((record.digit_ratio - 1.0 / 15.0).abs() < 1e-9);
    }

    #[test]
    fn test_uniform_char_prob() {
        assert_eq!(uniform_char_prob(""), 0.0);
        assert_eq!(uniform_char_prob("http://a.com"), 1.0 / 256.0);
    }

    #[tokio::test]
    async fn test_extract_reads_page_signals() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(Method::GET).path("/");
                then.status(200)
                    .header("content-type", "text/html")
                    .body(
                        r#"<html><head><title>127</title><link rel="icon" href="/f.ico">
                        <meta name="description" content="x"></head>
                        <body><form><input type="hidden" name="t"><input type="submit"></form>
                        <a href="https://twitter.com/x">t</a><p>Copyright 2024</p></body></html>"#,
                    );
            })
            .await;

        let record = extractor().extract(&server.url("/")).await;

        assert_eq!(record.is_https, 0.0);
        assert_eq!(record.has_title, 1.0);
        assert_eq!(record.has_favicon, 1.0);
        assert_eq!(record.has_description, 1.0);
        assert_eq!(record.has_social_net, 1.0);
        assert_eq!(record.has_submit_button, 1.0);
        assert_eq!(record.has_hidden_fields, 1.0);
        assert_eq!(record.has_copyright_info, 1.0);
        // host 127.0.0.1 is an IPv4 address, so the registrable label is the whole host
        assert_eq!(record.domain_title_match_score, match_ratio("127.0.0.1", "127"));
        assert!(record.url_title_match_score > 0.0);
        assert_in_ranges(&record);
    }

    #[tokio::test]
    async fn test_unreachable_page_defaults_page_features() {
        let record = extractor().extract("http://127.0.0.1:9/login").await;

        assert_eq!(record.has_title, 0.0);
        assert_eq!(record.domain_title_match_score, 0.0);
        assert_eq!(record.url_title_match_score, 0.0);
        assert_eq!(record.has_favicon, 0.0);
        assert_eq!(record.has_copyright_info, 0.0);
        assert!(record.url_similarity_index > 0.0);
        assert_in_ranges(&record);
    }

    #[tokio::test]
    async fn test_missing_scheme_matches_http_prefix() {
        let extractor = extractor();
        let bare = extractor.extract("127.0.0.1:9/account").await;
        let prefixed = extractor.extract("http://127.0.0.1:9/account").await;
        assert_eq!(bare, prefixed);
    }

    #[tokio::test]
    async fn test_unparseable_url_still_produces_record() {
        let record = extractor().extract("http://exa mple.com/").await;
        assert_eq!(record.has_title, 0.0);
        let expected = match_ratio("http://exa mple.com/", "exa mple.com");
        assert!((record.url_similarity_index - expected).abs() < 1e-9);
        assert_in_ranges(&record);
        assert!(record.special_char_ratio > 0.0);
    }

    #[test]
    fn test_https_flag() {
        let extractor = extractor();
        let record = extractor.build_record(
            &NormalizedUrl::new("https://www.wikipedia.org"),
            &PageSignals::default(),
        );
        assert_eq!(record.is_https, 1.0);
        let expected = match_ratio("https://www.wikipedia.org", "www.wikipedia.org");
        assert!((record.url_similarity_index - expected).abs() < 1e-9);
    }
}
