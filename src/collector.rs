//! Per-user collection: comment histories and profile metadata.
//!
//! Users are processed one at a time in input order. Each user is one unit of
//! the retry primitive; a user that keeps hitting the rate limit or fails
//! outright is logged and skipped, never aborting the run. Only local write
//! failures propagate.

use crate::append::CsvAppender;
use crate::config::CollectOptions;
use crate::error::FetchError;
use crate::gateway::{RedditApi, UserComment, UserMetadata};
use crate::progress::ProgressScope;
use crate::retry::{run_with_retry, Attempt, Sleeper};
use crate::users::{process_user_ids_with, Exclusions};
use crate::util::{elapsed_hours, estimate_hours_remaining};
use ahash::AHashSet;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Instant;

/// One collected comment, as written to the comments CSV.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CommentRow {
    pub comment_id: String,
    pub username: String,
    pub post_id: String,
    pub subreddit_id: String,
    pub timestamp: f64,
    /// Parent comment fullname, or the post's for a top-level comment.
    pub parent_comment: String,
    pub upvotes: i64,
    pub text: String,
}

impl CommentRow {
    pub fn new(username: &str, c: &UserComment) -> Self {
        Self {
            comment_id: c.id.clone(),
            username: username.to_string(),
            post_id: c.link_id.clone(),
            subreddit_id: c.subreddit_id.clone(),
            timestamp: c.created_utc,
            parent_comment: c.parent_id.clone(),
            upvotes: c.score,
            text: c.body.clone(),
        }
    }
}

/// Profile rows use the gateway type directly; its field order is the column order.
pub type MetadataRow = UserMetadata;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CollectReport {
    pub users_total: usize,
    pub users_done: usize,
    pub users_skipped: usize,
    pub rows_written: u64,
}

pub struct Collector<A, S> {
    api: A,
    sleeper: S,
    opts: CollectOptions,
    exclusions: Exclusions,
}

impl<A: RedditApi, S: Sleeper> Collector<A, S> {
    pub fn new(api: A, sleeper: S, opts: CollectOptions) -> Self {
        Self { api, sleeper, opts, exclusions: Exclusions::default() }
    }

    /// Names dropped from the metadata input on top of the defaults.
    pub fn with_exclusions(mut self, exclusions: Exclusions) -> Self {
        self.exclusions = exclusions;
        self
    }

    /// Stream every user's recent non-moderator comments into `out`.
    pub fn collect_comments<I, T>(&mut self, users: I, out: &Path) -> Result<CollectReport>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let users: Vec<String> = users.into_iter().map(|u| u.as_ref().trim().to_string()).collect();
        let mut csv = CsvAppender::<CommentRow>::new(out);
        let mut report = CollectReport { users_total: users.len(), ..Default::default() };
        let start = Instant::now();
        let progress = ProgressScope::maybe(self.opts.progress, "Users", users.len() as u64);
        tracing::info!(users = users.len(), limit = self.opts.comment_limit, out = %out.display(), "begin fetching comments");

        for (i, user) in users.iter().enumerate() {
            match self.user_comments(user, &mut csv)? {
                Attempt::Done(n) => {
                    report.users_done += 1;
                    tracing::debug!(user = %user, rows = n, "user complete");
                }
                _ => report.users_skipped += 1,
            }
            progress.inc_items(1);
            tracing::info!("Finished collecting comment data for user {} of {}", i + 1, users.len());
            tracing::info!("Time remaining: ~{:.2} hours", estimate_hours_remaining(i, users.len(), start));
        }

        report.rows_written = csv.rows_written();
        progress.finish("comments complete");
        tracing::info!(
            done = report.users_done,
            skipped = report.users_skipped,
            rows = report.rows_written,
            "Total time elapsed: {:.2} hours",
            elapsed_hours(start)
        );
        Ok(report)
    }

    /// One user's history under the retry primitive. A restart re-reads the
    /// listing from the top; comments already written in this run are skipped.
    fn user_comments(&mut self, user: &str, csv: &mut CsvAppender<CommentRow>) -> Result<Attempt<u64>> {
        let api = &self.api;
        let limit = self.opts.comment_limit;
        let mut seen: AHashSet<String> = AHashSet::new();
        let mut write_err: Option<anyhow::Error> = None;
        let unit = format!("user {user}");

        let outcome = run_with_retry(&self.opts.retry, &unit, &mut self.sleeper, |attempt| {
            if attempt > 0 {
                tracing::debug!(user, attempt, already_written = seen.len(), "restarting comment listing");
            }
            let mut written = 0u64;
            for item in api.user_comments(user, limit) {
                let comment = item?;
                if comment.is_moderator_voice() || !seen.insert(comment.id.clone()) {
                    continue;
                }
                if let Err(e) = csv.append(&CommentRow::new(user, &comment)) {
                    write_err = Some(e);
                    return Err(FetchError::Other(format!("could not write comment {}", comment.id)));
                }
                written += 1;
            }
            Ok(written)
        });

        match write_err {
            Some(e) => Err(e),
            None => Ok(outcome),
        }
    }

    /// Profile metadata for every distinct real user, one row per user.
    pub fn collect_metadata<I, T>(&mut self, users: I, out: &Path) -> Result<CollectReport>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let users = process_user_ids_with(users, &self.exclusions);
        let mut csv = CsvAppender::<MetadataRow>::new(out);
        let mut report = CollectReport { users_total: users.len(), ..Default::default() };
        let start = Instant::now();
        let progress = ProgressScope::maybe(self.opts.progress, "Users", users.len() as u64);
        tracing::info!(users = users.len(), out = %out.display(), "begin fetching user metadata");

        for (i, user) in users.iter().enumerate() {
            let api = &self.api;
            let unit = format!("metadata of {user}");
            match run_with_retry(&self.opts.retry, &unit, &mut self.sleeper, |_| api.user_metadata(user)) {
                Attempt::Done(meta) => {
                    csv.append(&meta)?;
                    report.users_done += 1;
                    tracing::info!("Finished collecting metadata for user \"{}\"", user);
                }
                _ => report.users_skipped += 1,
            }
            progress.inc_items(1);
            tracing::info!("Time remaining: ~{:.2} hours", estimate_hours_remaining(i, users.len(), start));
        }

        report.rows_written = csv.rows_written();
        progress.finish("metadata complete");
        tracing::info!(
            done = report.users_done,
            skipped = report.users_skipped,
            "Total time elapsed: {:.2} hours",
            elapsed_hours(start)
        );
        Ok(report)
    }
}
