//! The narrow read-only surface of the platform the pipeline needs.
//! `RedditClient` is the real implementation; tests plug in scripted doubles.

use crate::error::FetchResult;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Username recorded when a comment's author is gone (deleted account, removed comment).
pub const MISSING_AUTHOR: &str = "None";

/// Marker the platform sets on comments posted in an official moderator capacity.
pub const MODERATOR_DISTINGUISHED: &str = "moderator";

/// Post selection within a community.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ListingFilter {
    Top,
    New,
    Hot,
}

impl ListingFilter {
    pub fn as_str(self) -> &'static str {
        match self {
            ListingFilter::Top => "top",
            ListingFilter::New => "new",
            ListingFilter::Hot => "hot",
        }
    }
}

impl fmt::Display for ListingFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ListingFilter {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "top" => Ok(ListingFilter::Top),
            "new" => Ok(ListingFilter::New),
            "hot" => Ok(ListingFilter::Hot),
            other => Err(format!("unknown post filter '{other}' (expected top, new or hot)")),
        }
    }
}

/// Time window for `top` listings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimeWindow {
    All,
    Hour,
    Day,
    Week,
    Month,
    Year,
}

impl TimeWindow {
    pub fn as_str(self) -> &'static str {
        match self {
            TimeWindow::All => "all",
            TimeWindow::Hour => "hour",
            TimeWindow::Day => "day",
            TimeWindow::Week => "week",
            TimeWindow::Month => "month",
            TimeWindow::Year => "year",
        }
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeWindow {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all" => Ok(TimeWindow::All),
            "hour" => Ok(TimeWindow::Hour),
            "day" => Ok(TimeWindow::Day),
            "week" => Ok(TimeWindow::Week),
            "month" => Ok(TimeWindow::Month),
            "year" => Ok(TimeWindow::Year),
            other => Err(format!("unknown time window '{other}'")),
        }
    }
}

/// One comment from a user's history, as much of it as the collector keeps.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct UserComment {
    pub id: String,
    pub link_id: String,
    pub subreddit_id: String,
    pub created_utc: f64,
    pub parent_id: String,
    pub score: i64,
    pub body: String,
    #[serde(default)]
    pub distinguished: Option<String>,
}

impl UserComment {
    /// True when the comment was posted in an official moderation capacity.
    pub fn is_moderator_voice(&self) -> bool {
        self.distinguished.as_deref() == Some(MODERATOR_DISTINGUISHED)
    }
}

/// Profile metadata for one user.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UserMetadata {
    pub display_name: String,
    pub id: String,
    pub comment_karma: i64,
    pub total_karma: i64,
    pub created_utc: f64,
}

/// Lazy sequence over a paginated listing. Finite and bounded by the caller's limit;
/// restarting means asking the gateway for a fresh one.
pub type Listing<'a, T> = Box<dyn Iterator<Item = FetchResult<T>> + 'a>;

/// Capability object for the five reads the pipeline performs.
pub trait RedditApi {
    /// Up to `limit` post ids of `community`, in listing order.
    fn community_posts(&self, community: &str, filter: ListingFilter, window: TimeWindow, limit: usize) -> FetchResult<Vec<String>>;

    /// Every comment id of a post, with "more comments" placeholders resolved,
    /// flattened depth-first in display order.
    fn post_comments(&self, post_id: &str) -> FetchResult<Vec<String>>;

    /// Username of a comment's author, or [`MISSING_AUTHOR`].
    fn comment_author(&self, comment_id: &str) -> FetchResult<String>;

    /// A user's most recent comments, newest first, at most `limit`.
    fn user_comments<'a>(&'a self, username: &str, limit: usize) -> Listing<'a, UserComment>;

    fn user_metadata(&self, username: &str) -> FetchResult<UserMetadata>;
}

impl<T: RedditApi + ?Sized> RedditApi for &T {
    fn community_posts(&self, community: &str, filter: ListingFilter, window: TimeWindow, limit: usize) -> FetchResult<Vec<String>> {
        (**self).community_posts(community, filter, window, limit)
    }
    fn post_comments(&self, post_id: &str) -> FetchResult<Vec<String>> {
        (**self).post_comments(post_id)
    }
    fn comment_author(&self, comment_id: &str) -> FetchResult<String> {
        (**self).comment_author(comment_id)
    }
    fn user_comments<'a>(&'a self, username: &str, limit: usize) -> Listing<'a, UserComment> {
        (**self).user_comments(username, limit)
    }
    fn user_metadata(&self, username: &str) -> FetchResult<UserMetadata> {
        (**self).user_metadata(username)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters_and_windows_parse_case_insensitively() {
        assert_eq!("TOP".parse::<ListingFilter>().unwrap(), ListingFilter::Top);
        assert_eq!(" hot ".parse::<ListingFilter>().unwrap(), ListingFilter::Hot);
        assert!("best".parse::<ListingFilter>().is_err());
        assert_eq!("Year".parse::<TimeWindow>().unwrap(), TimeWindow::Year);
        assert_eq!(TimeWindow::All.to_string(), "all");
    }

    #[test]
    fn moderator_voice_is_detected_from_distinguished() {
        let mut c = UserComment {
            id: "c1".into(),
            link_id: "t3_p".into(),
            subreddit_id: "t5_s".into(),
            created_utc: 0.0,
            parent_id: "t3_p".into(),
            score: 1,
            body: "hi".into(),
            distinguished: None,
        };
        assert!(!c.is_moderator_voice());
        c.distinguished = Some("admin".into());
        assert!(!c.is_moderator_voice());
        c.distinguished = Some("moderator".into());
        assert!(c.is_moderator_voice());
    }
}
