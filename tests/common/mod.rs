#![allow(dead_code)]

use snowroll::{FetchError, FetchResult, Listing, ListingFilter, RedditApi, Sleeper, TimeWindow, UserComment, UserMetadata};
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// In-memory stand-in for the platform. Every read is served from the maps
/// below; failures are scripted per unit key:
///   - `community:<name>`, `post:<id>`, `comment:<id>`, `user:<name>`, `meta:<name>`
/// `rate_limits[key] = n` makes the next `n` calls for that key rate-limited;
/// keys in `broken` fail with a non-rate-limit error every time.
#[derive(Default)]
pub struct FakeApi {
    pub posts: HashMap<String, Vec<String>>,
    pub comments: HashMap<String, Vec<String>>,
    pub authors: HashMap<String, String>,
    pub histories: HashMap<String, Vec<UserComment>>,
    pub profiles: HashMap<String, UserMetadata>,

    pub rate_limits: RefCell<HashMap<String, u32>>,
    pub broken: HashSet<String>,
    /// `user:<name>` -> (items yielded before the fault, number of faulty listings)
    pub stream_faults: RefCell<HashMap<String, (usize, u32)>>,
    /// Fail every author lookup after this many have succeeded.
    pub author_budget: Option<usize>,

    pub author_lookups: Cell<usize>,
    pub calls: RefCell<Vec<String>>,
}

impl FakeApi {
    fn gate(&self, key: &str) -> FetchResult<()> {
        self.calls.borrow_mut().push(key.to_string());
        if self.broken.contains(key) {
            return Err(FetchError::Other(format!("{key} is broken")));
        }
        let mut limits = self.rate_limits.borrow_mut();
        if let Some(n) = limits.get_mut(key) {
            if *n > 0 {
                *n -= 1;
                return Err(FetchError::RateLimited(format!("{key} rate limited")));
            }
        }
        Ok(())
    }

    pub fn calls_to(&self, key: &str) -> usize {
        self.calls.borrow().iter().filter(|c| c.as_str() == key).count()
    }
}

impl RedditApi for FakeApi {
    fn community_posts(&self, community: &str, _filter: ListingFilter, _window: TimeWindow, limit: usize) -> FetchResult<Vec<String>> {
        self.gate(&format!("community:{community}"))?;
        let posts = self.posts.get(community).ok_or_else(|| FetchError::NotFound(community.to_string()))?;
        Ok(posts.iter().take(limit).cloned().collect())
    }

    fn post_comments(&self, post_id: &str) -> FetchResult<Vec<String>> {
        self.gate(&format!("post:{post_id}"))?;
        Ok(self.comments.get(post_id).cloned().unwrap_or_default())
    }

    fn comment_author(&self, comment_id: &str) -> FetchResult<String> {
        if let Some(budget) = self.author_budget {
            if self.author_lookups.get() >= budget {
                return Err(FetchError::Other("connection reset".into()));
            }
        }
        self.gate(&format!("comment:{comment_id}"))?;
        self.author_lookups.set(self.author_lookups.get() + 1);
        Ok(self.authors.get(comment_id).cloned().unwrap_or_else(|| "None".to_string()))
    }

    fn user_comments<'a>(&'a self, username: &str, limit: usize) -> Listing<'a, UserComment> {
        let key = format!("user:{username}");
        if let Err(e) = self.gate(&key) {
            return Box::new(std::iter::once(Err(e)));
        }
        let items: Vec<UserComment> = self.histories.get(username).cloned().unwrap_or_default().into_iter().take(limit).collect();

        let mut faults = self.stream_faults.borrow_mut();
        if let Some((after, times)) = faults.get_mut(&key) {
            if *times > 0 {
                *times -= 1;
                let head: Vec<FetchResult<UserComment>> = items.into_iter().take(*after).map(Ok).collect();
                let fault = FetchError::RateLimited(format!("{key} rate limited mid-listing"));
                return Box::new(head.into_iter().chain(std::iter::once(Err(fault))));
            }
        }
        Box::new(items.into_iter().map(Ok))
    }

    fn user_metadata(&self, username: &str) -> FetchResult<UserMetadata> {
        self.gate(&format!("meta:{username}"))?;
        self.profiles.get(username).cloned().ok_or_else(|| FetchError::NotFound(username.to_string()))
    }
}

/// Sleeper that only records what it was asked to wait.
#[derive(Default, Debug)]
pub struct RecordingSleeper {
    pub sleeps: Vec<Duration>,
}

impl Sleeper for RecordingSleeper {
    fn sleep(&mut self, d: Duration) {
        self.sleeps.push(d);
    }
}

/// Two communities with two posts each and three comments per post; comment
/// `<post>_c<k>` is written by `user_<post>_<k>`.
pub fn two_by_two_by_three() -> FakeApi {
    let mut api = FakeApi::default();
    for community in ["rust", "golang"] {
        let posts: Vec<String> = (1..=2).map(|p| format!("{community}_p{p}")).collect();
        for post in &posts {
            let comments: Vec<String> = (1..=3).map(|c| format!("{post}_c{c}")).collect();
            for (k, c) in comments.iter().enumerate() {
                api.authors.insert(c.clone(), format!("user_{post}_{}", k + 1));
            }
            api.comments.insert(post.clone(), comments);
        }
        api.posts.insert(community.to_string(), posts);
    }
    api
}

pub fn comment(id: &str, body: &str) -> UserComment {
    UserComment {
        id: id.to_string(),
        link_id: "t3_post".to_string(),
        subreddit_id: "t5_sub".to_string(),
        created_utc: 1_700_000_000.0,
        parent_id: "t3_post".to_string(),
        score: 3,
        body: body.to_string(),
        distinguished: None,
    }
}

pub fn mod_comment(id: &str, body: &str) -> UserComment {
    UserComment { distinguished: Some("moderator".to_string()), ..comment(id, body) }
}

pub fn profile(name: &str) -> UserMetadata {
    UserMetadata {
        display_name: name.to_string(),
        id: format!("id_{name}"),
        comment_karma: 10,
        total_karma: 25,
        created_utc: 1_600_000_000.0,
    }
}

/// Non-empty lines of a text file.
pub fn read_lines(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn write_file(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, contents).unwrap();
}
