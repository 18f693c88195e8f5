use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Disposition a reviewer left on a pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewState {
    Approved,
    ChangesRequested,
    Commented,
    Dismissed,
    Pending,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Review {
    pub state: ReviewState,
    pub author: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequest {
    pub number: u64,
    pub created_at: DateTime<Utc>,
    pub author: Option<String>,
    pub reviews: Vec<Review>,
}

#[cfg(test)]
impl Review {
    pub fn new(state: ReviewState, author: Option<&str>) -> Self {
        Self {
            state,
            author: author.map(str::to_string),
        }
    }
}

#[cfg(test)]
impl PullRequest {
    pub fn new(number: u64, created_at: DateTime<Utc>, author: Option<&str>) -> Self {
        Self {
            number,
            created_at,
            author: author.map(str::to_string),
            reviews: Vec::new(),
        }
    }

    pub fn with_review(mut self, review: Review) -> Self {
        self.reviews.push(review);
        self
    }
}
