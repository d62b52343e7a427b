use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, Once};
use std::thread::sleep;
use std::time::{Duration, Instant};
use time::macros::format_description;
use time::OffsetDateTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

// -------- tracing: stdout plus an optional plain-text run log --------

static INIT_ONCE: Once = Once::new();

/// Install the global subscriber once. Every event goes to stdout; when `log_file`
/// is given, the same events are appended (timestamped, no ANSI) to that file.
pub fn init_tracing(log_file: Option<&Path>) {
    INIT_ONCE.call_once(|| {
        let env_filter = || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        let file_layer = log_file.and_then(|path| {
            if let Some(parent) = path.parent() {
                let _ = fs::create_dir_all(parent);
            }
            match OpenOptions::new().create(true).append(true).open(path) {
                Ok(f) => Some(fmt::layer().with_ansi(false).with_target(false).with_writer(Mutex::new(f))),
                Err(e) => {
                    eprintln!("cannot open log file {}: {e}", path.display());
                    None
                }
            }
        });

        let _ = tracing_subscriber::registry()
            .with(env_filter())
            .with(fmt::layer().with_target(false))
            .with(file_layer)
            .try_init();
    });
}

/// Timestamp used to name one run's log file, e.g. `2024-03-01T09-15-02`.
pub fn run_stamp() -> String {
    let now = OffsetDateTime::now_utc();
    now.format(format_description!("[year]-[month]-[day]T[hour]-[minute]-[second]"))
        .unwrap_or_else(|_| now.unix_timestamp().to_string())
}

/// `<dir>/<stage>_<stamp>.log`
pub fn log_path_for(dir: &Path, stage: &str) -> PathBuf {
    dir.join(format!("{stage}_{}.log", run_stamp()))
}

// -------- time estimates --------

pub fn elapsed_hours(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() / 3600.0
}

/// Hours left, extrapolating the average time per finished task over the rest.
/// `task_index` is the 0-based index of the task that just finished.
pub fn estimate_hours_remaining(task_index: usize, total_tasks: usize, start: Instant) -> f64 {
    estimate_from_elapsed(elapsed_hours(start), task_index, total_tasks)
}

fn estimate_from_elapsed(elapsed_h: f64, task_index: usize, total_tasks: usize) -> f64 {
    let done = (task_index + 1) as f64;
    let left = total_tasks.saturating_sub(task_index + 1) as f64;
    elapsed_h / done * left
}

// -------- robust open/create with backoff (Windows-friendly) --------

/// Return true for transient/retriable I/O errors often seen on Windows when
/// filter drivers (AV/backup), USB/NAS volumes, or sharing violations occur.
fn is_retriable_io_error(e: &io::Error) -> bool {
    match e.raw_os_error() {
        //   5   = Access is denied (often AV/share)
        //   32  = Sharing violation
        //   33  = Lock violation
        //   1224= File with a user-mapped section open
        //   21  = Device not ready
        Some(5) | Some(32) | Some(33) | Some(1224) | Some(21) => true,
        _ => e.kind() == io::ErrorKind::Interrupted,
    }
}

fn with_backoff<T>(tries: usize, delay_ms: u64, mut f: impl FnMut() -> io::Result<T>) -> io::Result<T> {
    let mut last_err: Option<io::Error> = None;
    for i in 0..tries.max(1) {
        match f() {
            Ok(v) => return Ok(v),
            Err(e) if is_retriable_io_error(&e) => {
                last_err = Some(e);
                sleep(Duration::from_millis(delay_ms.saturating_mul((i + 1) as u64)));
            }
            Err(e) => return Err(e),
        }
    }
    Err(last_err.unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, "file operation failed")))
}

/// Open a file for appending (creating it if absent) with retries for transient errors.
pub fn append_with_backoff(path: &Path, tries: usize, delay_ms: u64) -> io::Result<File> {
    with_backoff(tries, delay_ms, || OpenOptions::new().create(true).append(true).open(path))
}

/// Create (truncate) a file with retries for transient errors.
pub fn create_with_backoff(path: &Path, tries: usize, delay_ms: u64) -> io::Result<File> {
    with_backoff(tries, delay_ms, || File::create(path))
}

/// Remove a file with retries. Succeeds if the file doesn't exist.
pub fn remove_with_backoff(path: &Path, tries: usize, delay_ms: u64) -> Result<()> {
    with_backoff(tries, delay_ms, || match fs::remove_file(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    })
    .with_context(|| format!("remove {}", path.display()))
}

/// Replace `dest` with `tmp`. Falls back to copy+remove when rename is refused.
pub fn replace_file_atomic_backoff(tmp: &Path, dest: &Path) -> Result<()> {
    let tries = 20usize;
    let delay_ms = 50u64;
    if dest.exists() {
        remove_with_backoff(dest, tries, delay_ms)?;
    }
    match with_backoff(tries, delay_ms, || fs::rename(tmp, dest)) {
        Ok(()) => Ok(()),
        Err(_) => {
            with_backoff(tries, delay_ms, || fs::copy(tmp, dest))
                .with_context(|| format!("copy {} -> {}", tmp.display(), dest.display()))?;
            remove_with_backoff(tmp, tries, delay_ms)
        }
    }
}

/// Serialize `value` as pretty JSON to a sibling temp file, then promote it over `path`.
pub fn write_json_atomic<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let tmp = path.with_extension("json.inprogress");
    {
        let f = create_with_backoff(&tmp, 16, 50).with_context(|| format!("create {}", tmp.display()))?;
        let mut w = io::BufWriter::new(f);
        serde_json::to_writer_pretty(&mut w, value)?;
        io::Write::flush(&mut w)?;
    }
    replace_file_atomic_backoff(&tmp, path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimate_extrapolates_average_task_time() {
        // 2h spent on 4 tasks out of 10 -> 0.5h each, 6 left
        assert!((estimate_from_elapsed(2.0, 3, 10) - 3.0).abs() < 1e-9);
        // last task done -> nothing left
        assert_eq!(estimate_from_elapsed(5.0, 9, 10), 0.0);
    }

    #[test]
    fn json_is_promoted_over_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.json");
        fs::write(&path, "stale").unwrap();
        write_json_atomic(&path, &serde_json::json!({"users": ["a"]})).unwrap();
        let v: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(v["users"][0], "a");
        assert!(!path.with_extension("json.inprogress").exists());
    }
}
