//! metrics.rs
//!
//! Per-user review metrics for one calendar year of pull requests.
//!
//! Every PR created in the target year counts once for its author. A reviewer
//! who requested changes on a PR is counted once for that PR no matter how many
//! CHANGES_REQUESTED reviews they left, and the author gets one "received
//! changes" mark if at least one reviewer did so.

use std::collections::{BTreeMap, HashSet};

use chrono::Datelike;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use tracing::debug;

use crate::model::{PullRequest, ReviewState};

/// Username used for PRs whose author account no longer resolves.
pub const UNKNOWN_AUTHOR: &str = "unknown";

/// Username -> metrics. Ordered so that serialized output is stable run to run.
pub type MetricsByUser = BTreeMap<String, UserMetrics>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserMetrics {
    pub prs_receiving_changes: u64,
    pub changes_requested: u64,
    #[serde(rename = "totalPRsOpened")]
    pub total_prs_opened: u64,
    #[serde(default)]
    pub change_request_ratio: ChangeRequestRatio,
}

/// Share of a user's PRs that received change requests.
///
/// Serialized as the number `0` when the user opened no PRs, otherwise as a
/// percentage string with exactly one fractional digit (`"33.3"`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ChangeRequestRatio {
    #[default]
    Zero,
    Percent(String),
}

impl ChangeRequestRatio {
    pub fn from_counts(prs_receiving_changes: u64, total_prs_opened: u64) -> Self {
        if total_prs_opened == 0 {
            return ChangeRequestRatio::Zero;
        }

        // tenths of a percent, rounded half up
        let tenths = (prs_receiving_changes * 2000 + total_prs_opened) / (2 * total_prs_opened);
        ChangeRequestRatio::Percent(format!("{}.{}", tenths / 10, tenths % 10))
    }

    /// Numeric value used for plotting. Unparseable text plots as zero.
    pub fn value(&self) -> f64 {
        match self {
            ChangeRequestRatio::Zero => 0.0,
            ChangeRequestRatio::Percent(text) => text.trim().parse().unwrap_or(0.0),
        }
    }
}

impl Serialize for ChangeRequestRatio {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ChangeRequestRatio::Zero => serializer.serialize_u64(0),
            ChangeRequestRatio::Percent(text) => serializer.serialize_str(text),
        }
    }
}

impl<'de> Deserialize<'de> for ChangeRequestRatio {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(f64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(n) if n == 0.0 => Ok(ChangeRequestRatio::Zero),
            Raw::Number(n) if n.is_finite() => Ok(ChangeRequestRatio::Percent(format!("{n:.1}"))),
            Raw::Number(n) => Err(de::Error::custom(format!("invalid ratio {n}"))),
            Raw::Text(text) => Ok(ChangeRequestRatio::Percent(text)),
        }
    }
}

/// Build the metrics mapping for PRs created in `year` (UTC).
///
/// PRs from other years are ignored entirely, reviews included. Reviews with no
/// resolvable author are ignored.
pub fn aggregate(pull_requests: &[PullRequest], year: i32) -> MetricsByUser {
    let mut metrics = MetricsByUser::new();

    for pr in pull_requests.iter().filter(|pr| pr.created_at.year() == year) {
        let author = pr.author.as_deref().unwrap_or(UNKNOWN_AUTHOR);
        metrics.entry(author.to_string()).or_default().total_prs_opened += 1;

        let change_requesters: HashSet<&str> = pr
            .reviews
            .iter()
            .filter(|review| review.state == ReviewState::ChangesRequested)
            .filter_map(|review| review.author.as_deref())
            .collect();

        for reviewer in &change_requesters {
            metrics
                .entry(reviewer.to_string())
                .or_default()
                .changes_requested += 1;
        }

        if !change_requesters.is_empty() {
            metrics.entry(author.to_string()).or_default().prs_receiving_changes += 1;
        }

        debug!("Processed PR #{} by {}", pr.number, author);
    }

    for user in metrics.values_mut() {
        user.change_request_ratio =
            ChangeRequestRatio::from_counts(user.prs_receiving_changes, user.total_prs_opened);
    }

    metrics
}
