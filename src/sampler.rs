//! Snowball sampler: seed communities -> posts -> comments -> authors.
//!
//! The walk is strictly sequential (seed order, then post order, then comment
//! order). Every author is appended to the users CSV the moment it is known,
//! before the in-memory frame is touched, so an interrupted run leaves one line
//! per completed lookup on disk. Authors are recorded once per comment; dedup
//! is left to `users::process_user_ids` so the frame keeps multiplicity.

use crate::append::CsvAppender;
use crate::config::{SampleOptions, WalkPolicy};
use crate::error::FetchError;
use crate::gateway::RedditApi;
use crate::progress::ProgressScope;
use crate::retry::{run_with_retry, Attempt, Sleeper};
use crate::users::UserRow;
use crate::util::write_json_atomic;
use anyhow::{anyhow, Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Instant;

/// The sampled graph. Map order is traversal order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SamplingFrame {
    pub subreddits_to_posts: IndexMap<String, Vec<String>>,
    pub posts_to_comments: IndexMap<String, Vec<String>>,
    pub comments_to_users: IndexMap<String, String>,
    /// One entry per (post, comment) visited; duplicates kept.
    pub users: Vec<String>,
}

impl SamplingFrame {
    pub fn comment_count(&self) -> usize {
        self.posts_to_comments.values().map(Vec::len).sum()
    }

    /// The flat author list as a single-column table.
    pub fn user_table(&self) -> UserTable {
        UserTable { users: self.users.clone() }
    }

    /// Pretty JSON with the four top-level keys.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        write_json_atomic(path, self).with_context(|| format!("write sampling frame {}", path.display()))
    }

    pub fn read_json(path: &Path) -> Result<Self> {
        let f = std::fs::File::open(path).with_context(|| format!("open {}", path.display()))?;
        Ok(serde_json::from_reader(std::io::BufReader::new(f))?)
    }
}

/// Flat author list destined for the `users` CSV.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UserTable {
    pub users: Vec<String>,
}

impl UserTable {
    /// Overwrites `path` with exactly this run's authors, unlike the users CSV
    /// appended to during the walk.
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        crate::users::write_users_csv(path, &self.users)
    }
}

pub struct SnowballSampler<A, S> {
    api: A,
    sleeper: S,
    opts: SampleOptions,
}

impl<A: RedditApi, S: Sleeper> SnowballSampler<A, S> {
    pub fn new(api: A, sleeper: S, opts: SampleOptions) -> Self {
        Self { api, sleeper, opts }
    }

    /// Walk every seed and return the frame plus its flat author table.
    /// With `WalkPolicy::FailFast` a failed comment listing or author lookup aborts
    /// the run; whatever was appended to the users CSV up to that point stays.
    pub fn sample<I, T>(&mut self, seeds: I) -> Result<(SamplingFrame, UserTable)>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let seeds: Vec<String> = seeds.into_iter().map(|s| s.as_ref().trim().to_string()).collect();
        if seeds.is_empty() {
            return Err(anyhow!("at least one seed community is required"));
        }
        if self.opts.posts_per_seed == 0 {
            return Err(anyhow!("posts_per_seed must be positive"));
        }

        let start = Instant::now();
        tracing::info!(
            seeds = seeds.len(),
            filter = %self.opts.filter,
            window = %self.opts.time_window,
            posts_per_seed = self.opts.posts_per_seed,
            "begin snowball sample"
        );

        let mut users_csv = CsvAppender::<UserRow>::new(&self.opts.users_csv);
        let mut frame = SamplingFrame::default();
        let progress = ProgressScope::maybe(self.opts.progress, "Seeds", seeds.len() as u64);

        for seed in &seeds {
            let posts = self.seed_posts(seed);
            frame.subreddits_to_posts.insert(seed.clone(), posts.clone());

            for (i, post) in posts.iter().enumerate() {
                let Some(comments) = self.post_comments(post)? else { continue };
                frame.posts_to_comments.insert(post.clone(), comments.clone());

                for comment in &comments {
                    let author = self.comment_author(comment)?;
                    self.sleeper.sleep(self.opts.pace);
                    let Some(author) = author else { continue };

                    users_csv
                        .append(&UserRow { users: author.clone() })
                        .with_context(|| format!("append author of comment {comment}"))?;
                    frame.comments_to_users.insert(comment.clone(), author.clone());
                    frame.users.push(author);
                }
                tracing::info!("Finished post {} of seed \"{}\"", i + 1, seed);
            }
            progress.inc_items(1);
        }

        progress.finish("sample complete");
        tracing::info!(
            posts = frame.posts_to_comments.len(),
            authors = frame.users.len(),
            "Sample complete. Time elapsed: {:.2} minutes",
            start.elapsed().as_secs_f64() / 60.0
        );

        let table = frame.user_table();
        Ok((frame, table))
    }

    /// Post ids for one seed. A community that cannot be listed yields an empty list.
    fn seed_posts(&mut self, seed: &str) -> Vec<String> {
        let (filter, window, limit) = (self.opts.filter, self.opts.time_window, self.opts.posts_per_seed);
        let api = &self.api;
        let res = match self.opts.walk_policy {
            WalkPolicy::FailFast => api.community_posts(seed, filter, window, limit).map_err(|e| e.to_string()),
            WalkPolicy::Retry(policy) => {
                let unit = format!("community {seed}");
                match run_with_retry(&policy, &unit, &mut self.sleeper, |_| api.community_posts(seed, filter, window, limit)) {
                    Attempt::Done(v) => Ok(v),
                    other => Err(other.error_text().unwrap_or_default().to_string()),
                }
            }
        };
        match res {
            Ok(posts) => posts,
            Err(e) => {
                tracing::warn!(seed, error = %e, "could not list posts; skipping community");
                Vec::new()
            }
        }
    }

    /// `Ok(None)` means the post was skipped under the retry policy.
    fn post_comments(&mut self, post: &str) -> Result<Option<Vec<String>>> {
        let api = &self.api;
        walk_call(self.opts.walk_policy, &mut self.sleeper, &format!("post {post}"), |_| api.post_comments(post))
    }

    /// `Ok(None)` means the comment was skipped under the retry policy.
    fn comment_author(&mut self, comment: &str) -> Result<Option<String>> {
        let api = &self.api;
        walk_call(self.opts.walk_policy, &mut self.sleeper, &format!("comment {comment}"), |_| api.comment_author(comment))
    }
}

fn walk_call<T, S: Sleeper>(
    policy: WalkPolicy,
    sleeper: &mut S,
    unit: &str,
    mut op: impl FnMut(u32) -> Result<T, FetchError>,
) -> Result<Option<T>> {
    match policy {
        WalkPolicy::FailFast => op(0).map(Some).map_err(|e| anyhow!("{unit}: {e}")),
        WalkPolicy::Retry(policy) => match run_with_retry(&policy, unit, sleeper, op) {
            Attempt::Done(v) => Ok(Some(v)),
            other => {
                tracing::warn!(unit, error = other.error_text().unwrap_or_default(), "skipped during walk");
                Ok(None)
            }
        },
    }
}

/// Seed community names from a JSON document holding a list under `key`.
pub fn read_seeds(path: &Path, key: &str) -> Result<Vec<String>> {
    let f = std::fs::File::open(path).with_context(|| format!("open seeds {}", path.display()))?;
    let doc: serde_json::Value = serde_json::from_reader(std::io::BufReader::new(f))
        .with_context(|| format!("parse seeds {}", path.display()))?;
    let list = doc
        .get(key)
        .and_then(|v| v.as_array())
        .ok_or_else(|| anyhow!("{} has no list under key '{}'", path.display(), key))?;
    let seeds: Vec<String> = list.iter().filter_map(|v| v.as_str()).map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect();
    if seeds.is_empty() {
        return Err(anyhow!("seed list '{}' in {} is empty", key, path.display()));
    }
    Ok(seeds)
}
