use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Column names of the feature record, in the order the record serializes them.
///
/// The first sixteen are the columns the shipped models were trained on; the
/// trailing two lexical ratios are reported alongside and only reach a model
/// whose artifact names them in its feature order.
pub const FEATURE_NAMES: [&str; 18] = [
    "URL",
    "Domain",
    "URLSimilarityIndex",
    "CharContinuationRate",
    "URLCharProb",
    "IsHTTPS",
    "HasTitle",
    "DomainTitleMatchScore",
    "URLTitleMatchScore",
    "HasFavicon",
    "IsResponsive",
    "HasDescription",
    "HasSocialNet",
    "HasSubmitButton",
    "HasHiddenFields",
    "HasCopyrightInfo",
    "DegitRatioInURL",
    "SpacialCharRatioInURL",
];

pub const FEATURE_COUNT: usize = FEATURE_NAMES.len();

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Legitimate,
    Phishing,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Legitimate => "LEGITIMATE",
            Verdict::Phishing => "PHISHING",
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictRequest {
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictResponse {
    pub url: String,
    pub verdict: Verdict,
    pub probability: f64,
    pub reasons: Vec<String>,
    pub decision_id: Uuid,
    pub features: FeatureRecord,
}

/// Signals derived from one URL and its page.
///
/// Flags are stored as `0.0`/`1.0` so the record can be handed to a model as-is.
/// `url`, `domain` and `is_responsive` are constant placeholders for columns the
/// training data carried but which cannot be derived here, and `url_char_prob`
/// is a uniform stand-in; treat all four as approximations, not signals.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    #[serde(rename = "URL")]
    pub url: f64,
    #[serde(rename = "Domain")]
    pub domain: f64,
    #[serde(rename = "URLSimilarityIndex")]
    pub url_similarity_index: f64,
    #[serde(rename = "CharContinuationRate")]
    pub char_continuation_rate: f64,
    #[serde(rename = "URLCharProb")]
    pub url_char_prob: f64,
    #[serde(rename = "IsHTTPS")]
    pub is_https: f64,
    #[serde(rename = "HasTitle")]
    pub has_title: f64,
    #[serde(rename = "DomainTitleMatchScore")]
    pub domain_title_match_score: f64,
    #[serde(rename = "URLTitleMatchScore")]
    pub url_title_match_score: f64,
    #[serde(rename = "HasFavicon")]
    pub has_favicon: f64,
    #[serde(rename = "IsResponsive")]
    pub is_responsive: f64,
    #[serde(rename = "HasDescription")]
    pub has_description: f64,
    #[serde(rename = "HasSocialNet")]
    pub has_social_net: f64,
    #[serde(rename = "HasSubmitButton")]
    pub has_submit_button: f64,
    #[serde(rename = "HasHiddenFields")]
    pub has_hidden_fields: f64,
    #[serde(rename = "HasCopyrightInfo")]
    pub has_copyright_info: f64,
    #[serde(rename = "DegitRatioInURL")]
    pub digit_ratio: f64,
    #[serde(rename = "SpacialCharRatioInURL")]
    pub special_char_ratio: f64,
}

impl FeatureRecord {
    /// Values in `FEATURE_NAMES` order.
    pub fn values(&self) -> [f64; FEATURE_COUNT] {
        [
            self.url,
            self.domain,
            self.url_similarity_index,
            self.char_continuation_rate,
            self.url_char_prob,
            self.is_https,
            self.has_title,
            self.domain_title_match_score,
            self.url_title_match_score,
            self.has_favicon,
            self.is_responsive,
            self.has_description,
            self.has_social_net,
            self.has_submit_button,
            self.has_hidden_fields,
            self.has_copyright_info,
            self.digit_ratio,
            self.special_char_ratio,
        ]
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        let index = FEATURE_NAMES.iter().position(|n| *n == name)?;
        Some(self.values()[index])
    }
}

pub(crate) fn flag(value: bool) -> f64 {
    if value {
        1.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialized_field_order_matches_feature_names() {
        let record = FeatureRecord::default();
        let json = serde_json::to_string(&record).unwrap();
        let mut last = 0;
        for name in FEATURE_NAMES {
            let needle = format!("\"{}\":", name);
            let position = json.find(&needle).unwrap_or_else(|| panic!("missing {}", name));
            assert!(position >= last, "{} out of order", name);
            last = position;
        }
    }

    #[test]
    fn test_get_by_name() {
        let record = FeatureRecord {
            is_https: 1.0,
            url_similarity_index: 0.42,
            ..Default::default()
        };
        assert_eq!(record.get("IsHTTPS"), Some(1.0));
        assert_eq!(record.get("URLSimilarityIndex"), Some(0.42));
        assert_eq!(record.get("NotAFeature"), None);
    }

    #[test]
    fn test_verdict_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&Verdict::Phishing).unwrap(), "\"PHISHING\"");
        assert_eq!(Verdict::Legitimate.to_string(), "LEGITIMATE");
    }

    #[test]
    fn test_missing_url_deserializes_to_none() {
        let request: PredictRequest = serde_json::from_str("{}").unwrap();
        assert!(request.url.is_none());
    }
}
