#[path = "common/mod.rs"]
mod common;

use common::*;
use snowroll::{clean_comments_file, downsample_rows};

const HEADER: &str = "comment_id,username,post_id,subreddit_id,timestamp,parent_comment,upvotes,text";

fn comments_csv(rows: &[(&str, &str)]) -> String {
    let mut s = format!("{HEADER}\n");
    for (id, text) in rows {
        s.push_str(&format!("{id},alice,t3_p,t5_s,1700000000.0,t3_p,1,\"{text}\"\n"));
    }
    s
}

/// Emojis and links are stripped, non-English and emptied rows are dropped,
/// all other columns pass through unchanged.
#[test]
fn clean_keeps_english_rows_only() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("comments.csv");
    let output = dir.path().join("clean").join("comments_CLEAN.csv");
    write_file(
        &input,
        &comments_csv(&[
            ("c1", "I think this is a really good point 😀 and I agree with it completely"),
            ("c2", "https://example.com/only-a-link"),
            ("c3", "Je pense que c'est vraiment une très bonne idée pour tout le monde ici"),
            ("c4", "thanks"),
        ]),
    );

    let report = clean_comments_file(&input, &output).unwrap();
    assert_eq!(report.rows_in, 4);
    assert_eq!(report.rows_kept, 2);

    let mut rdr = csv::Reader::from_path(&output).unwrap();
    assert_eq!(rdr.headers().unwrap().iter().collect::<Vec<_>>().join(","), HEADER);
    let rows: Vec<csv::StringRecord> = rdr.records().map(|r| r.unwrap()).collect();
    assert_eq!(&rows[0][0], "c1");
    assert_eq!(&rows[0][7], "I think this is a really good point and I agree with it completely");
    assert_eq!(&rows[0][1], "alice");
    assert_eq!(&rows[1][0], "c4");
    assert_eq!(&rows[1][7], "thanks");
}

#[test]
fn clean_requires_a_text_column() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("bad.csv");
    write_file(&input, "comment_id,body\nc1,hello\n");
    assert!(clean_comments_file(&input, &dir.path().join("out.csv")).is_err());
}

/// A 55% sample of 20 rows keeps 11, preserves the header and file order,
/// and is identical for the same seed.
#[test]
fn downsample_is_sized_ordered_and_seeded() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("comments.csv");
    let ids: Vec<String> = (0..20).map(|i| format!("c{i:02}")).collect();
    let rows: Vec<(&str, &str)> = ids.iter().map(|id| (id.as_str(), "text")).collect();
    write_file(&input, &comments_csv(&rows));

    let a = dir.path().join("a.csv");
    let b = dir.path().join("b.csv");
    assert_eq!(downsample_rows(&input, &a, 0.55, 1).unwrap(), 11);
    assert_eq!(downsample_rows(&input, &b, 0.55, 1).unwrap(), 11);

    let lines = read_lines(&a);
    assert_eq!(lines[0], HEADER);
    assert_eq!(lines.len(), 12);
    assert_eq!(lines, read_lines(&b));

    let kept: Vec<&str> = lines[1..].iter().map(|l| &l[..3]).collect();
    let mut sorted = kept.clone();
    sorted.sort();
    assert_eq!(kept, sorted);
}

#[test]
fn downsample_rejects_bad_fractions() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("comments.csv");
    write_file(&input, &comments_csv(&[("c1", "x")]));
    assert!(downsample_rows(&input, &dir.path().join("o.csv"), 1.5, 1).is_err());
    assert!(downsample_rows(&input, &dir.path().join("o.csv"), -0.1, 1).is_err());
}
