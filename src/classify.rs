//! Classification runner: batches comment text through a text classifier and
//! streams the labels to disk.

use crate::append::CsvAppender;
use crate::config::ClassifyOptions;
use crate::normalize::clean_text;
use crate::progress::ProgressScope;
use crate::util::{elapsed_hours, estimate_hours_remaining, remove_with_backoff, write_json_atomic};
use anyhow::{anyhow, Context, Result};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::{Duration, Instant};

/// Public inference host; each model is served under `<endpoint>/<model>`.
pub const DEFAULT_ENDPOINT: &str = "https://api-inference.huggingface.co/models";

/// Top label for one input.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Label {
    pub label: String,
    pub score: f64,
}

/// Anything that labels a batch of texts. Output has the same length and order as the input.
pub trait TextClassifier {
    fn classify(&self, texts: &[String]) -> Result<Vec<Label>>;
}

impl<T: TextClassifier + ?Sized> TextClassifier for &T {
    fn classify(&self, texts: &[String]) -> Result<Vec<Label>> {
        (**self).classify(texts)
    }
}

/// Per-input prediction as returned by the host: either just the top label or
/// every label with its score.
#[derive(Deserialize)]
#[serde(untagged)]
enum Prediction {
    Top(Label),
    All(Vec<Label>),
}

impl Prediction {
    fn best(self) -> Option<Label> {
        match self {
            Prediction::Top(l) => Some(l),
            Prediction::All(ls) => ls.into_iter().max_by(|a, b| a.score.total_cmp(&b.score)),
        }
    }
}

/// Sequence classifier served over HTTP.
pub struct HostedClassifier {
    http: Client,
    url: String,
    token: Option<String>,
    max_length: usize,
}

impl HostedClassifier {
    pub fn new(endpoint: &str, model: &str) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .context("build HTTP client")?;
        Ok(Self {
            http,
            url: format!("{}/{}", endpoint.trim_end_matches('/'), model.trim_matches('/')),
            token: None,
            max_length: 512,
        })
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.trim().is_empty());
        self
    }

    pub fn with_max_length(mut self, n: usize) -> Self {
        self.max_length = n.max(1);
        self
    }
}

impl TextClassifier for HostedClassifier {
    fn classify(&self, texts: &[String]) -> Result<Vec<Label>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let body = serde_json::json!({
            "inputs": texts,
            "parameters": { "truncation": true, "max_length": self.max_length },
        });
        let mut req = self.http.post(&self.url).json(&body);
        if let Some(t) = &self.token {
            req = req.bearer_auth(t);
        }
        let resp = req.send().with_context(|| format!("POST {}", self.url))?;
        let status = resp.status();
        let text = resp.text().with_context(|| format!("read response from {}", self.url))?;
        if !status.is_success() {
            return Err(anyhow!("classifier returned HTTP {} for {}: {}", status.as_u16(), self.url, text));
        }
        let preds: Vec<Prediction> = serde_json::from_str(&text).with_context(|| format!("parse response from {}", self.url))?;
        if preds.len() != texts.len() {
            return Err(anyhow!("classifier returned {} predictions for {} inputs", preds.len(), texts.len()));
        }
        preds
            .into_iter()
            .map(|p| p.best().ok_or_else(|| anyhow!("classifier returned an empty prediction")))
            .collect()
    }
}

/// One labelled comment in the CSV output.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToxicityRow {
    pub comment_id: String,
    pub toxicity_label: String,
    pub toxicity_score: f64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ClassifyReport {
    pub rows: usize,
    pub batches: usize,
}

/// `(comment_id, text)` for every row, in file order.
fn read_id_text(input: &Path) -> Result<Vec<(String, String)>> {
    let mut rdr = csv::Reader::from_path(input).with_context(|| format!("open {}", input.display()))?;
    let headers = rdr.headers()?.clone();
    let col = |name: &str| {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| anyhow!("{} has no '{}' column", input.display(), name))
    };
    let (id_col, text_col) = (col("comment_id")?, col("text")?);
    let mut out = Vec::new();
    for rec in rdr.records() {
        let rec = rec.with_context(|| format!("read {}", input.display()))?;
        out.push((rec.get(id_col).unwrap_or_default().to_string(), rec.get(text_col).unwrap_or_default().to_string()));
    }
    Ok(out)
}

/// Label every non-empty comment of `input` and append one row per comment to
/// `output`, a batch at a time. A pre-existing `output` is replaced.
pub fn classify_to_csv<C: TextClassifier>(classifier: &C, input: &Path, output: &Path, opts: &ClassifyOptions) -> Result<ClassifyReport> {
    if output.exists() {
        remove_with_backoff(output, 16, 50)?;
        tracing::info!("A pre-existing output file has been deleted: {}", output.display());
    }
    let rows: Vec<(String, String)> = read_id_text(input)?
        .into_iter()
        .filter(|(_, text)| !text.trim().is_empty())
        .collect();

    let batch_size = opts.batch_size.max(1);
    let n_batches = rows.len().div_ceil(batch_size);
    let mut csv = CsvAppender::<ToxicityRow>::new(output);
    let progress = ProgressScope::maybe(opts.progress, "Comments", rows.len() as u64);
    let start = Instant::now();
    let mut report = ClassifyReport::default();

    for (i, batch) in rows.chunks(batch_size).enumerate() {
        let texts: Vec<String> = batch.iter().map(|(_, t)| t.clone()).collect();
        let labels = classifier.classify(&texts).with_context(|| format!("classify batch {}", i + 1))?;
        if labels.len() != batch.len() {
            return Err(anyhow!("batch {}: got {} labels for {} comments", i + 1, labels.len(), batch.len()));
        }
        let out: Vec<ToxicityRow> = batch
            .iter()
            .zip(labels)
            .map(|((id, _), l)| ToxicityRow { comment_id: id.clone(), toxicity_label: l.label, toxicity_score: l.score })
            .collect();
        csv.append_batch(&out)?;

        report.rows += out.len();
        report.batches += 1;
        progress.inc_items(out.len() as u64);
        tracing::info!("Comments labelled: {}", report.rows);
        tracing::info!(
            "Time remaining: ~{:.1} hours, elapsed {:.1} hours",
            estimate_hours_remaining(i, n_batches, start),
            elapsed_hours(start)
        );
    }

    progress.finish("classification complete");
    Ok(report)
}

#[derive(Serialize)]
struct LabelDoc {
    label: Vec<String>,
}

/// Clean every comment of `input`, label it, and write `{"label": [...]}` to
/// `output`, aligned with input order. Text that does not survive cleaning is
/// classified as the empty string.
pub fn classify_to_json<C: TextClassifier>(classifier: &C, input: &Path, output: &Path, opts: &ClassifyOptions) -> Result<usize> {
    let texts: Vec<String> = read_id_text(input)?
        .into_iter()
        .map(|(_, text)| clean_text(&text).unwrap_or_default())
        .collect();

    let progress = ProgressScope::maybe(opts.progress, "Comments", texts.len() as u64);
    let start = Instant::now();
    let mut labels: Vec<String> = Vec::with_capacity(texts.len());
    for (i, batch) in texts.chunks(opts.batch_size.max(1)).enumerate() {
        let out = classifier.classify(batch).with_context(|| format!("classify batch {}", i + 1))?;
        if out.len() != batch.len() {
            return Err(anyhow!("batch {}: got {} labels for {} comments", i + 1, out.len(), batch.len()));
        }
        labels.extend(out.into_iter().map(|l| l.label));
        progress.inc_items(batch.len() as u64);
    }
    progress.finish("classification complete");

    write_json_atomic(output, &LabelDoc { label: labels })?;
    tracing::info!(rows = texts.len(), "Time elapsed: {:.2} hours", elapsed_hours(start));
    Ok(texts.len())
}
