//! Username bookkeeping after the walk: dedup, exclusions, random subsets.
//!
//! The walk records one author per comment visited, so the raw list carries
//! duplicates plus two names that are not real participants: the stringified
//! missing author and the moderation bot.

use crate::gateway::MISSING_AUTHOR;
use ahash::AHashSet;
use anyhow::{anyhow, Context, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Column header of every username table.
pub const USERS_COLUMN: &str = "users";

pub const MODERATION_BOT: &str = "AutoModerator";

/// One row of a username table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRow {
    pub users: String,
}

/// Names that never count as sampled users.
#[derive(Clone, Debug)]
pub struct Exclusions {
    names: Vec<String>,
}

impl Default for Exclusions {
    fn default() -> Self {
        Self { names: vec![MISSING_AUTHOR.to_string(), MODERATION_BOT.to_string()] }
    }
}

impl Exclusions {
    /// Defaults plus anything listed in the environment:
    /// - SNOWROLL_EXCLUDE_AUTHORS: comma/semicolon/space separated names
    /// - SNOWROLL_EXCLUDE_AUTHORS_FILE: path to newline-separated file of names
    pub fn from_env() -> Self {
        let mut ex = Self::default();
        ex.merge_env();
        ex
    }

    pub fn with_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for n in names {
            let n = n.into().trim().to_string();
            if !n.is_empty() {
                self.names.push(n);
            }
        }
        self.names.sort();
        self.names.dedup();
        self
    }

    fn merge_env(&mut self) {
        use std::fs::File;
        use std::io::{BufRead, BufReader};

        let mut extra: Vec<String> = Vec::new();
        if let Ok(s) = std::env::var("SNOWROLL_EXCLUDE_AUTHORS") {
            extra.extend(s.split(|c: char| c == ',' || c == ';' || c.is_whitespace()).map(str::to_string));
        }
        if let Ok(path) = std::env::var("SNOWROLL_EXCLUDE_AUTHORS_FILE") {
            if !path.trim().is_empty() {
                match File::open(&path) {
                    Ok(f) => extra.extend(BufReader::new(f).lines().map_while(|l| l.ok())),
                    Err(e) => tracing::warn!("SNOWROLL_EXCLUDE_AUTHORS_FILE is set but cannot be opened: {} ({})", path, e),
                }
            }
        }
        *self = std::mem::take(self).with_names(extra);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }
}

/// Dedup and drop excluded names, keeping each user at its first appearance.
pub fn process_user_ids<I, S>(ids: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    process_user_ids_with(ids, &Exclusions::default())
}

pub fn process_user_ids_with<I, S>(ids: I, exclusions: &Exclusions) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen: AHashSet<String> = AHashSet::new();
    let mut out = Vec::new();
    for id in ids {
        let id = id.as_ref().trim();
        if id.is_empty() || exclusions.contains(id) {
            continue;
        }
        if seen.insert(id.to_string()) {
            out.push(id.to_string());
        }
    }
    out
}

/// Read the `users` column of a username table, in file order.
pub fn read_users_csv(path: &Path) -> Result<Vec<String>> {
    let mut rdr = csv::Reader::from_path(path).with_context(|| format!("open {}", path.display()))?;
    let headers = rdr.headers()?.clone();
    let col = headers
        .iter()
        .position(|h| h.trim() == USERS_COLUMN)
        .ok_or_else(|| anyhow!("{} has no '{}' column", path.display(), USERS_COLUMN))?;
    let mut out = Vec::new();
    for rec in rdr.records() {
        let rec = rec.with_context(|| format!("read {}", path.display()))?;
        if let Some(u) = rec.get(col) {
            out.push(u.to_string());
        }
    }
    Ok(out)
}

/// Write a fresh username table (header `users`).
pub fn write_users_csv(path: &Path, users: &[String]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let mut w = csv::Writer::from_path(path).with_context(|| format!("create {}", path.display()))?;
    for u in users {
        w.serialize(UserRow { users: u.clone() })?;
    }
    // keep the header even for an empty table
    if users.is_empty() {
        w.write_record([USERS_COLUMN])?;
    }
    w.flush()?;
    Ok(())
}

/// Random subset of `round(len * fraction)` cleaned users, reproducible for a given seed.
pub fn subset_users(users: &[String], fraction: f64, seed: u64) -> Result<Vec<String>> {
    if !(0.0..=1.0).contains(&fraction) {
        return Err(anyhow!("fraction must be within [0, 1], got {fraction}"));
    }
    let cleaned = process_user_ids(users);
    let k = ((cleaned.len() as f64) * fraction).round() as usize;
    let mut rng = StdRng::seed_from_u64(seed);
    Ok(cleaned.choose_multiple(&mut rng, k).cloned().collect())
}
