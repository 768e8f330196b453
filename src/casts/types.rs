// src/casts/types.rs
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Author {
    pub id: u64,
    pub handle: String,
    pub display_name: String,
    pub avatar_url: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Engagement {
    pub likes: u64,
    pub recasts: u64,
    pub replies: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Link {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Canonical post record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Cast {
    pub id: String,
    pub text: String,
    pub author: Author,
    pub engagement: Engagement,
    /// Epoch milliseconds.
    pub published_at: i64,
    pub links: Vec<Link>,
    /// Set by ranking only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

/// One upstream page, consumed by the normalizer right away.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageResult {
    pub casts: Vec<serde_json::Value>,
    pub next_cursor: Option<String>,
}

/// Response payload of both aggregation operations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct RankedResult {
    pub casts: Vec<Cast>,
    /// Candidate count before truncation.
    pub total: usize,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub partial: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub requires_payment: bool,
}

impl RankedResult {
    pub fn degraded(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.partial || self.error.is_some() || self.requires_payment
    }
}
