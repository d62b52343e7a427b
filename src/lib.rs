mod append;
mod classify;
mod cleaning;
mod client;
mod collector;
mod config;
mod error;
mod gateway;
mod normalize;
mod progress;
mod retry;
mod sampler;
mod users;
mod util;

pub use crate::config::{ClassifyOptions, CollectOptions, Credentials, SampleOptions, WalkPolicy, NAMECALLING_MODEL, TOXICITY_MODEL};
pub use crate::error::{FetchError, FetchResult};
pub use crate::gateway::{Listing, ListingFilter, RedditApi, TimeWindow, UserComment, UserMetadata, MISSING_AUTHOR, MODERATOR_DISTINGUISHED};
pub use crate::client::{Endpoints, RedditClient, API_BASE, TOKEN_URL};

pub use crate::sampler::{read_seeds, SamplingFrame, SnowballSampler, UserTable};
pub use crate::collector::{CollectReport, Collector, CommentRow, MetadataRow};
pub use crate::users::{process_user_ids, process_user_ids_with, read_users_csv, subset_users, write_users_csv, Exclusions, UserRow, MODERATION_BOT, USERS_COLUMN};

// retry primitive and row-at-a-time CSV appends
pub use crate::retry::{run_with_retry, Attempt, RetryPolicy, Sleeper, ThreadSleeper};
pub use crate::append::CsvAppender;

// text cleaning
pub use crate::normalize::{check_language, clean_text, decode_emojis, remove_emojis, remove_urls, LANGUAGE_SAMPLE_WORDS};
pub use crate::cleaning::{clean_comments_file, downsample_rows, CleanReport};

pub use crate::classify::{classify_to_csv, classify_to_json, ClassifyReport, HostedClassifier, Label, TextClassifier, ToxicityRow, DEFAULT_ENDPOINT};

pub use crate::progress::ProgressScope;

//export logging setup and time helpers so the binary can import from crate root.
pub use crate::util::{elapsed_hours, estimate_hours_remaining, init_tracing, log_path_for, run_stamp};
