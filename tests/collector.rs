#[path = "common/mod.rs"]
mod common;

use common::*;
use snowroll::{CollectOptions, Collector, CommentRow, Exclusions, MetadataRow};
use std::path::Path;
use std::time::Duration;

fn quiet() -> CollectOptions {
    CollectOptions::default().with_progress(false)
}

fn read_rows<T: serde::de::DeserializeOwned>(path: &Path) -> Vec<T> {
    csv::Reader::from_path(path).unwrap().deserialize().map(|r| r.unwrap()).collect()
}

fn api_with_histories() -> FakeApi {
    let mut api = FakeApi::default();
    api.histories.insert(
        "alice".into(),
        vec![comment("a1", "first"), mod_comment("a2", "Removed: rule 3"), comment("a3", "third, with a comma")],
    );
    api.histories.insert("bob".into(), vec![comment("b1", "hello\nworld")]);
    api
}

/// Moderator-voice comments are filtered; every other comment becomes one row
/// below a single header, users in input order.
#[test]
fn comments_are_streamed_without_moderator_voice() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("comments.csv");
    let api = api_with_histories();

    let report = Collector::new(&api, RecordingSleeper::default(), quiet())
        .collect_comments(["alice", "bob"], &out)
        .unwrap();

    assert_eq!(report.users_total, 2);
    assert_eq!(report.users_done, 2);
    assert_eq!(report.rows_written, 3);

    let rows: Vec<CommentRow> = read_rows(&out);
    let ids: Vec<&str> = rows.iter().map(|r| r.comment_id.as_str()).collect();
    assert_eq!(ids, vec!["a1", "a3", "b1"]);
    assert_eq!(rows[0].username, "alice");
    assert_eq!(rows[0].post_id, "t3_post");
    assert_eq!(rows[0].upvotes, 3);
    assert_eq!(rows[1].text, "third, with a comma");
    assert_eq!(rows[2].text, "hello\nworld");

    let header = std::fs::read_to_string(&out).unwrap().lines().next().unwrap().to_string();
    assert_eq!(header, "comment_id,username,post_id,subreddit_id,timestamp,parent_comment,upvotes,text");
}

/// A listing that hits the rate limit after two comments is restarted after a
/// backoff; the comments written before the fault are not written again.
#[test]
fn restarted_listing_does_not_duplicate_rows() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("comments.csv");
    let mut api = FakeApi::default();
    api.histories.insert("carol".into(), (1..=5).map(|i| comment(&format!("c{i}"), "text")).collect());
    api.stream_faults.borrow_mut().insert("user:carol".into(), (2, 1));
    let mut sleeper = RecordingSleeper::default();

    let report = Collector::new(&api, &mut sleeper, quiet()).collect_comments(["carol"], &out).unwrap();

    assert_eq!(report.users_done, 1);
    assert_eq!(report.rows_written, 5);
    let ids: Vec<String> = read_rows::<CommentRow>(&out).into_iter().map(|r| r.comment_id).collect();
    assert_eq!(ids, vec!["c1", "c2", "c3", "c4", "c5"]);
    assert_eq!(sleeper.sleeps, vec![Duration::from_secs(1)]);
}

/// A user that never gets past the rate limit, and one that fails outright,
/// are skipped; the rest of the run carries on.
#[test]
fn failing_users_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("comments.csv");
    let mut api = api_with_histories();
    api.rate_limits.borrow_mut().insert("user:alice".into(), 99);
    api.broken.insert("user:ghost".into());

    let report = Collector::new(&api, RecordingSleeper::default(), quiet())
        .collect_comments(["alice", "ghost", "bob"], &out)
        .unwrap();

    assert_eq!(api.calls_to("user:alice"), 3);
    assert_eq!(api.calls_to("user:ghost"), 1);
    assert_eq!(report.users_done, 1);
    assert_eq!(report.users_skipped, 2);
    assert_eq!(read_rows::<CommentRow>(&out).len(), 1);
}

#[test]
fn comment_limit_caps_each_history() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("comments.csv");
    let mut api = FakeApi::default();
    api.histories.insert("dan".into(), (1..=10).map(|i| comment(&format!("d{i}"), "t")).collect());

    let report = Collector::new(&api, RecordingSleeper::default(), quiet().with_comment_limit(4))
        .collect_comments(["dan"], &out)
        .unwrap();
    assert_eq!(report.rows_written, 4);
}

/// Metadata input is deduplicated and cleaned of non-users before any call.
#[test]
fn metadata_rows_for_distinct_real_users() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("meta").join("user-metadata.csv");
    let mut api = FakeApi::default();
    for name in ["alice", "bob"] {
        api.profiles.insert(name.into(), profile(name));
    }

    let report = Collector::new(&api, RecordingSleeper::default(), quiet())
        .collect_metadata(["alice", "None", "alice", "AutoModerator", "bob", "gone"], &out)
        .unwrap();

    assert_eq!(report.users_total, 3);
    assert_eq!(report.users_done, 2);
    assert_eq!(report.users_skipped, 1);
    assert_eq!(api.calls_to("meta:None"), 0);
    assert_eq!(api.calls_to("meta:AutoModerator"), 0);

    let rows: Vec<MetadataRow> = read_rows(&out);
    assert_eq!(rows, vec![profile("alice"), profile("bob")]);
    assert_eq!(read_lines(&out)[0], "display_name,id,comment_karma,total_karma,created_utc");
}

#[test]
fn metadata_respects_extra_exclusions() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("user-metadata.csv");
    let mut api = FakeApi::default();
    api.profiles.insert("alice".into(), profile("alice"));

    let report = Collector::new(&api, RecordingSleeper::default(), quiet())
        .with_exclusions(Exclusions::default().with_names(["helper-bot"]))
        .collect_metadata(["helper-bot", "alice"], &out)
        .unwrap();
    assert_eq!(report.users_total, 1);
    assert_eq!(api.calls_to("meta:helper-bot"), 0);
}
