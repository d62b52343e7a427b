//! Blocking HTTP implementation of [`RedditApi`] against the OAuth API.
//!
//! Authentication is the password grant of a script app; the bearer token is
//! refreshed on demand shortly before it expires.

use crate::config::Credentials;
use crate::error::{FetchError, FetchResult};
use crate::gateway::{Listing, ListingFilter, RedditApi, TimeWindow, UserComment, UserMetadata, MISSING_AUTHOR};
use ahash::AHashSet;
use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use url::Url;

pub const TOKEN_URL: &str = "https://www.reddit.com/api/v1/access_token";
pub const API_BASE: &str = "https://oauth.reddit.com";

/// Largest page the listing endpoints hand out.
const PAGE_SIZE: usize = 100;
/// Ids per `/api/morechildren` call.
const MORE_CHUNK: usize = 100;
/// Refresh the token this long before it actually expires.
const TOKEN_SLACK: Duration = Duration::from_secs(60);

/// Where to authenticate and where to send API calls.
#[derive(Clone, Debug)]
pub struct Endpoints {
    pub token_url: String,
    pub api_base: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self { token_url: TOKEN_URL.to_string(), api_base: API_BASE.to_string() }
    }
}

struct Token {
    value: String,
    expires_at: Instant,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<u64>,
    error: Option<String>,
}

#[derive(Deserialize)]
struct AboutData {
    name: String,
    id: String,
    #[serde(default)]
    comment_karma: i64,
    #[serde(default)]
    link_karma: i64,
    total_karma: Option<i64>,
    created_utc: f64,
}

pub struct RedditClient {
    http: Client,
    creds: Credentials,
    token_url: String,
    api_base: Url,
    token: RefCell<Token>,
}

impl RedditClient {
    /// Authenticate against the production endpoints.
    pub fn connect(creds: &Credentials) -> FetchResult<Self> {
        Self::connect_to(creds, Endpoints::default())
    }

    pub fn connect_to(creds: &Credentials, endpoints: Endpoints) -> FetchResult<Self> {
        let http = Client::builder()
            .user_agent(creds.user_agent.clone())
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        let api_base = Url::parse(&endpoints.api_base)
            .map_err(|e| FetchError::Other(format!("invalid API base {}: {e}", endpoints.api_base)))?;
        let token = fetch_token(&http, creds, &endpoints.token_url)?;
        tracing::info!(user = %creds.username, "API authentication successful");
        Ok(Self { http, creds: creds.clone(), token_url: endpoints.token_url, api_base, token: RefCell::new(token) })
    }

    fn bearer(&self) -> FetchResult<String> {
        let stale = self.token.borrow().expires_at <= Instant::now() + TOKEN_SLACK;
        if stale {
            tracing::debug!("refreshing access token");
            let fresh = fetch_token(&self.http, &self.creds, &self.token_url)?;
            *self.token.borrow_mut() = fresh;
        }
        Ok(self.token.borrow().value.clone())
    }

    fn get_json(&self, path: &str, query: &[(&str, &str)]) -> FetchResult<Value> {
        let mut url = self
            .api_base
            .join(path)
            .map_err(|e| FetchError::Other(format!("bad request path {path}: {e}")))?;
        {
            let mut q = url.query_pairs_mut();
            q.append_pair("raw_json", "1");
            for (k, v) in query {
                q.append_pair(k, v);
            }
        }
        let resp = self.http.get(url).bearer_auth(self.bearer()?).send()?;
        let body = check_status(resp, path)?.text()?;
        Ok(serde_json::from_str(&body)?)
    }

    /// One page of a listing: its children and the cursor for the next page.
    fn listing_page(&self, path: &str, query: &[(&str, &str)], after: Option<&str>, want: usize) -> FetchResult<(Vec<Value>, Option<String>)> {
        let limit = want.clamp(1, PAGE_SIZE).to_string();
        let mut q: Vec<(&str, &str)> = query.to_vec();
        q.push(("limit", limit.as_str()));
        if let Some(a) = after {
            q.push(("after", a));
        }
        let mut doc = self.get_json(path, &q)?;
        let data = take_data(&mut doc);
        let after = data["after"].as_str().filter(|s| !s.is_empty()).map(str::to_string);
        let children = match data.get("children") {
            Some(Value::Array(items)) => items.clone(),
            _ => Vec::new(),
        };
        Ok((children, after))
    }

    fn more_children(&self, link_id: &str, ids: &[String]) -> FetchResult<Vec<Node>> {
        let mut out = Vec::new();
        for chunk in ids.chunks(MORE_CHUNK) {
            let children = chunk.join(",");
            let doc = self.get_json(
                "/api/morechildren",
                &[("api_type", "json"), ("link_id", link_id), ("children", children.as_str())],
            )?;
            if let Some(things) = doc["json"]["data"]["things"].as_array() {
                flatten_tree(things, &mut out);
            }
        }
        Ok(out)
    }
}

fn fetch_token(http: &Client, creds: &Credentials, token_url: &str) -> FetchResult<Token> {
    let resp = http
        .post(token_url)
        .basic_auth(&creds.client_id, Some(&creds.client_secret))
        .form(&[("grant_type", "password"), ("username", creds.username.as_str()), ("password", creds.password.as_str())])
        .send()?;
    let body = check_status(resp, "access_token")?.text()?;
    let parsed: TokenResponse = serde_json::from_str(&body)?;
    match (parsed.access_token, parsed.error) {
        (Some(value), _) => Ok(Token {
            value,
            expires_at: Instant::now() + Duration::from_secs(parsed.expires_in.unwrap_or(3600)),
        }),
        (None, Some(err)) => Err(FetchError::Other(format!("authentication failed: {err}"))),
        (None, None) => Err(FetchError::Other("authentication failed: no access token in response".into())),
    }
}

fn check_status(resp: Response, path: &str) -> FetchResult<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    match status {
        StatusCode::TOO_MANY_REQUESTS => {
            let retry_after = resp
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .map(|s| format!(" (retry-after {s}s)"))
                .unwrap_or_default();
            Err(FetchError::RateLimited(format!("HTTP 429 for {path}{retry_after}")))
        }
        StatusCode::NOT_FOUND => Err(FetchError::NotFound(path.to_string())),
        _ => Err(FetchError::Other(format!("HTTP {} for {path}", status.as_u16()))),
    }
}

/// Move the `data` member out of a thing; `Null` when absent.
fn take_data(thing: &mut Value) -> Value {
    thing.get_mut("data").map(Value::take).unwrap_or(Value::Null)
}

/// Accept both bare ids and fullnames (`t1_abc`).
fn bare_id<'a>(id: &'a str, prefix: &str) -> &'a str {
    id.trim().strip_prefix(prefix).unwrap_or(id.trim())
}

fn author_name(raw: Option<&str>) -> String {
    match raw {
        Some(a) if !a.is_empty() && a != "[deleted]" => a.to_string(),
        _ => MISSING_AUTHOR.to_string(),
    }
}

/// A flattened comment tree: known comment ids and unresolved placeholders.
#[derive(Debug, PartialEq)]
enum Node {
    Comment(String),
    More(Vec<String>),
}

/// Depth-first, display order. Placeholders with no ids ("continue this thread") are dropped.
fn flatten_tree(children: &[Value], out: &mut Vec<Node>) {
    for child in children {
        let data = &child["data"];
        match child["kind"].as_str() {
            Some("t1") => {
                if let Some(id) = data["id"].as_str() {
                    out.push(Node::Comment(id.to_string()));
                }
                if let Some(replies) = data["replies"]["data"]["children"].as_array() {
                    flatten_tree(replies, out);
                }
            }
            Some("more") => {
                let ids: Vec<String> = data["children"]
                    .as_array()
                    .map(|a| a.iter().filter_map(Value::as_str).map(str::to_string).collect())
                    .unwrap_or_default();
                if !ids.is_empty() {
                    out.push(Node::More(ids));
                }
            }
            _ => {}
        }
    }
}

impl RedditApi for RedditClient {
    fn community_posts(&self, community: &str, filter: ListingFilter, window: TimeWindow, limit: usize) -> FetchResult<Vec<String>> {
        let path = format!("/r/{}/{}", community.trim(), filter.as_str());
        let query: Vec<(&str, &str)> = match filter {
            ListingFilter::Top => vec![("t", window.as_str())],
            _ => Vec::new(),
        };
        let mut ids = Vec::new();
        let mut after: Option<String> = None;
        while ids.len() < limit {
            let room = limit - ids.len();
            let (children, next) = self.listing_page(&path, &query, after.as_deref(), room)?;
            if children.is_empty() {
                break;
            }
            ids.extend(
                children
                    .iter()
                    .filter(|c| c["kind"].as_str() == Some("t3"))
                    .filter_map(|c| c["data"]["id"].as_str())
                    .map(str::to_string)
                    .take(room),
            );
            match next {
                Some(cursor) => after = Some(cursor),
                None => break,
            }
        }
        Ok(ids)
    }

    fn post_comments(&self, post_id: &str) -> FetchResult<Vec<String>> {
        let post_id = bare_id(post_id, "t3_");
        let doc = self.get_json(&format!("/comments/{post_id}"), &[("limit", "500")])?;
        let top = doc
            .get(1)
            .and_then(|listing| listing["data"]["children"].as_array())
            .ok_or_else(|| FetchError::Other(format!("post {post_id}: response has no comment listing")))?;

        let mut nodes = Vec::new();
        flatten_tree(top, &mut nodes);

        // Resolve placeholders in place so the final order matches the display order.
        let link_id = format!("t3_{post_id}");
        let mut requested: AHashSet<String> = AHashSet::new();
        while let Some(pos) = nodes.iter().position(|n| matches!(n, Node::More(_))) {
            let resolved = match &nodes[pos] {
                Node::More(ids) => {
                    let fresh: Vec<String> = ids.iter().filter(|id| requested.insert((*id).clone())).cloned().collect();
                    if fresh.is_empty() { Vec::new() } else { self.more_children(&link_id, &fresh)? }
                }
                Node::Comment(_) => Vec::new(),
            };
            nodes.splice(pos..=pos, resolved);
        }

        Ok(nodes
            .into_iter()
            .filter_map(|n| match n {
                Node::Comment(id) => Some(id),
                Node::More(_) => None,
            })
            .collect())
    }

    fn comment_author(&self, comment_id: &str) -> FetchResult<String> {
        let id = bare_id(comment_id, "t1_");
        let fullname = format!("t1_{id}");
        let doc = self.get_json("/api/info", &[("id", fullname.as_str())])?;
        let child = doc["data"]["children"]
            .get(0)
            .ok_or_else(|| FetchError::NotFound(format!("comment {id}")))?;
        Ok(author_name(child["data"]["author"].as_str()))
    }

    fn user_comments<'a>(&'a self, username: &str, limit: usize) -> Listing<'a, UserComment> {
        Box::new(UserCommentPages {
            client: self,
            path: format!("/user/{}/comments", username.trim()),
            remaining: limit,
            after: None,
            buffer: VecDeque::new(),
            exhausted: false,
        })
    }

    fn user_metadata(&self, username: &str) -> FetchResult<UserMetadata> {
        let mut doc = self.get_json(&format!("/user/{}/about", username.trim()), &[])?;
        let about: AboutData = serde_json::from_value(take_data(&mut doc))?;
        Ok(UserMetadata {
            display_name: about.name,
            id: about.id,
            comment_karma: about.comment_karma,
            total_karma: about.total_karma.unwrap_or(about.comment_karma + about.link_karma),
            created_utc: about.created_utc,
        })
    }
}

/// Newest-first comment history, fetched a page at a time as the caller pulls.
struct UserCommentPages<'a> {
    client: &'a RedditClient,
    path: String,
    remaining: usize,
    after: Option<String>,
    buffer: VecDeque<UserComment>,
    exhausted: bool,
}

impl UserCommentPages<'_> {
    fn fill(&mut self) -> FetchResult<()> {
        let (children, next) = self.client.listing_page(&self.path, &[("sort", "new")], self.after.as_deref(), self.remaining)?;
        if children.is_empty() {
            self.exhausted = true;
        }
        for mut child in children {
            let comment: UserComment = serde_json::from_value(take_data(&mut child))?;
            self.buffer.push_back(comment);
        }
        match next {
            Some(cursor) => self.after = Some(cursor),
            None => self.exhausted = true,
        }
        Ok(())
    }
}

impl Iterator for UserCommentPages<'_> {
    type Item = FetchResult<UserComment>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        if self.buffer.is_empty() {
            if self.exhausted {
                return None;
            }
            if let Err(e) = self.fill() {
                self.remaining = 0;
                return Some(Err(e));
            }
        }
        let comment = self.buffer.pop_front()?;
        self.remaining -= 1;
        Some(Ok(comment))
    }
}
