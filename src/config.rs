use crate::gateway::{ListingFilter, TimeWindow};
use crate::retry::RetryPolicy;
use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// API credentials for a script-type app. Built once at the program boundary
/// and handed to `RedditClient::connect`; nothing reads them from globals.
#[derive(Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
    pub user_agent: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("username", &self.username)
            .field("user_agent", &self.user_agent)
            .finish_non_exhaustive()
    }
}

impl Credentials {
    /// Read REDDIT_CLIENT_ID, REDDIT_CLIENT_SECRET, REDDIT_USERNAME, REDDIT_PASSWORD
    /// and REDDIT_USER_AGENT.
    pub fn from_env() -> Result<Self> {
        let var = |k: &str| std::env::var(k).map_err(|_| anyhow!("environment variable {k} is not set"));
        Ok(Self {
            client_id: var("REDDIT_CLIENT_ID")?,
            client_secret: var("REDDIT_CLIENT_SECRET")?,
            username: var("REDDIT_USERNAME")?,
            password: var("REDDIT_PASSWORD")?,
            user_agent: var("REDDIT_USER_AGENT")?,
        })
    }
}

/// What the walk does when a comment listing or author lookup fails.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WalkPolicy {
    /// Abort the whole run on the first failure.
    FailFast,
    /// Retry rate limits; skip the post/comment when retries run out or on other errors.
    Retry(RetryPolicy),
}

/// Options for one snowball sample.
#[derive(Clone, Debug)]
pub struct SampleOptions {
    pub filter: ListingFilter,
    pub time_window: TimeWindow,
    pub posts_per_seed: usize,
    pub pace: Duration,            // pause after every author lookup
    pub walk_policy: WalkPolicy,
    pub users_csv: PathBuf,        // appended to during the walk
    pub progress: bool,
}

impl Default for SampleOptions {
    fn default() -> Self {
        Self {
            filter: ListingFilter::Top,
            time_window: TimeWindow::Year,
            posts_per_seed: 3,
            pace: Duration::from_millis(500),
            walk_policy: WalkPolicy::FailFast,
            users_csv: PathBuf::from("data/user-sample.csv"),
            progress: true,
        }
    }
}

impl SampleOptions {
    pub fn with_filter(mut self, filter: ListingFilter) -> Self { self.filter = filter; self }
    pub fn with_time_window(mut self, window: TimeWindow) -> Self { self.time_window = window; self }
    pub fn with_posts_per_seed(mut self, n: usize) -> Self { self.posts_per_seed = n; self }
    pub fn with_pace(mut self, pace: Duration) -> Self { self.pace = pace; self }
    pub fn with_walk_policy(mut self, policy: WalkPolicy) -> Self { self.walk_policy = policy; self }
    pub fn with_users_csv(mut self, path: impl AsRef<Path>) -> Self { self.users_csv = path.as_ref().to_path_buf(); self }
    pub fn with_progress(mut self, yes: bool) -> Self { self.progress = yes; self }
}

/// Options shared by the per-user collectors (comment history, profile metadata).
#[derive(Clone, Debug)]
pub struct CollectOptions {
    pub comment_limit: usize,
    pub retry: RetryPolicy,
    pub progress: bool,
}

impl Default for CollectOptions {
    fn default() -> Self {
        Self { comment_limit: 1000, retry: RetryPolicy::default(), progress: true }
    }
}

impl CollectOptions {
    pub fn with_comment_limit(mut self, n: usize) -> Self { self.comment_limit = n.max(1); self }
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self { self.retry = retry; self }
    pub fn with_progress(mut self, yes: bool) -> Self { self.progress = yes; self }
}

pub const TOXICITY_MODEL: &str = "s-nlp/roberta_toxicity_classifier";
pub const NAMECALLING_MODEL: &str = "civility-lab/roberta-base-namecalling";

/// Options for the classification runner.
#[derive(Clone, Debug)]
pub struct ClassifyOptions {
    pub batch_size: usize,
    pub max_length: usize,         // tokens; longer inputs are truncated by the model host
    pub progress: bool,
}

impl Default for ClassifyOptions {
    fn default() -> Self {
        Self { batch_size: 64, max_length: 512, progress: true }
    }
}

impl ClassifyOptions {
    pub fn with_batch_size(mut self, n: usize) -> Self { self.batch_size = n.max(1); self }
    pub fn with_max_length(mut self, n: usize) -> Self { self.max_length = n.max(1); self }
    pub fn with_progress(mut self, yes: bool) -> Self { self.progress = yes; self }
}
