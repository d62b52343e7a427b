use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use snowroll::{
    classify_to_csv, classify_to_json, clean_comments_file, downsample_rows, init_tracing, log_path_for,
    process_user_ids_with, read_seeds, read_users_csv, subset_users, write_users_csv, ClassifyOptions,
    CollectOptions, Collector, Credentials, Exclusions, HostedClassifier, ListingFilter, RedditClient,
    RetryPolicy, SampleOptions, SnowballSampler, ThreadSleeper, TimeWindow, WalkPolicy, DEFAULT_ENDPOINT,
    NAMECALLING_MODEL, TOXICITY_MODEL,
};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "snowroll", version, about = "Snowball sampling of Reddit users and their comments")]
struct Cli {
    /// Directory receiving one `<stage>_<timestamp>.log` per run.
    #[arg(long, global = true, default_value = "logs")]
    log_dir: PathBuf,

    /// Disable progress bars.
    #[arg(long, global = true)]
    no_progress: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct CredentialArgs {
    #[arg(long, env = "REDDIT_CLIENT_ID", hide_env_values = true)]
    client_id: String,
    #[arg(long, env = "REDDIT_CLIENT_SECRET", hide_env_values = true)]
    client_secret: String,
    #[arg(long, env = "REDDIT_USERNAME")]
    username: String,
    #[arg(long, env = "REDDIT_PASSWORD", hide_env_values = true)]
    password: String,
    #[arg(long, env = "REDDIT_USER_AGENT")]
    user_agent: String,
}

impl From<CredentialArgs> for Credentials {
    fn from(a: CredentialArgs) -> Self {
        Credentials {
            client_id: a.client_id,
            client_secret: a.client_secret,
            username: a.username,
            password: a.password,
            user_agent: a.user_agent,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Walk seed communities to posts, comments and authors.
    Sample {
        #[command(flatten)]
        creds: CredentialArgs,
        /// JSON document holding the seed communities.
        #[arg(long)]
        seeds: PathBuf,
        /// Key of the seed list inside the document.
        #[arg(long, default_value = "all")]
        seed_key: String,
        #[arg(long, default_value = "top")]
        filter: ListingFilter,
        #[arg(long, default_value = "year")]
        window: TimeWindow,
        #[arg(long, default_value_t = 3)]
        posts_per_seed: usize,
        /// Pause after every author lookup, in milliseconds.
        #[arg(long, default_value_t = 500)]
        pace_ms: u64,
        /// Retry rate-limited calls during the walk this many times and skip what
        /// still fails; 0 aborts on the first failure.
        #[arg(long, default_value_t = 0)]
        walk_retries: u32,
        /// Appended to as authors are found.
        #[arg(long, default_value = "data/sample/user-sample.csv")]
        users_out: PathBuf,
        #[arg(long, default_value = "data/sample/sampling-frame.json")]
        frame_out: PathBuf,
        /// This run's flat author list, rewritten every run.
        #[arg(long, default_value = "data/sample/users.csv")]
        table_out: PathBuf,
    },
    /// Username table utilities.
    Users {
        #[command(subcommand)]
        command: UsersCommand,
    },
    /// Collect each user's recent comments.
    Comments {
        #[command(flatten)]
        creds: CredentialArgs,
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
        #[arg(long, default_value_t = 1000)]
        limit: usize,
        #[arg(long, default_value_t = 3)]
        retries: u32,
    },
    /// Collect profile metadata for every distinct user.
    Metadata {
        #[command(flatten)]
        creds: CredentialArgs,
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
        #[arg(long, default_value_t = 3)]
        retries: u32,
    },
    /// Strip emojis and URLs from comment text and keep English rows only.
    Clean {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
    },
    /// Keep a seeded random fraction of a CSV's rows.
    Downsample {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
        #[arg(long)]
        fraction: f64,
        #[arg(long, default_value_t = 1)]
        seed: u64,
    },
    /// Label comments with a hosted text classifier.
    Classify {
        #[command(subcommand)]
        command: ClassifyCommand,
    },
}

#[derive(Subcommand, Debug)]
enum UsersCommand {
    /// Drop duplicates and non-user names.
    Dedupe {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
    },
    /// Random subset of the cleaned users.
    Subset {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
        #[arg(long, default_value_t = 0.2)]
        fraction: f64,
        #[arg(long, default_value_t = 1)]
        seed: u64,
    },
}

#[derive(Args, Debug)]
struct ModelArgs {
    #[arg(long)]
    input: PathBuf,
    #[arg(long)]
    output: PathBuf,
    /// Model id; defaults to the stage's model.
    #[arg(long)]
    model: Option<String>,
    #[arg(long, default_value = DEFAULT_ENDPOINT)]
    endpoint: String,
    #[arg(long, env = "HF_API_TOKEN", hide_env_values = true)]
    token: Option<String>,
    #[arg(long, default_value_t = 64)]
    batch_size: usize,
}

#[derive(Subcommand, Debug)]
enum ClassifyCommand {
    /// Toxicity labels, streamed to CSV.
    Toxicity(ModelArgs),
    /// Name-calling labels, written as one JSON document.
    Namecalling(ModelArgs),
}

impl Command {
    fn stage(&self) -> &'static str {
        match self {
            Command::Sample { .. } => "snowball-sample",
            Command::Users { command: UsersCommand::Dedupe { .. } } => "user-dedupe",
            Command::Users { command: UsersCommand::Subset { .. } } => "user-subset",
            Command::Comments { .. } => "user-comment-extraction",
            Command::Metadata { .. } => "user-metadata",
            Command::Clean { .. } => "comments-clean",
            Command::Downsample { .. } => "downsample",
            Command::Classify { command: ClassifyCommand::Toxicity(_) } => "toxicity-classify",
            Command::Classify { command: ClassifyCommand::Namecalling(_) } => "namecalling-classify",
        }
    }
}

fn hosted(args: &ModelArgs, default_model: &str, opts: &ClassifyOptions) -> Result<HostedClassifier> {
    let model = args.model.as_deref().unwrap_or(default_model);
    tracing::info!(model, endpoint = %args.endpoint, "using hosted classifier");
    Ok(HostedClassifier::new(&args.endpoint, model)?
        .with_token(args.token.clone())
        .with_max_length(opts.max_length))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let log_path = log_path_for(&cli.log_dir, cli.command.stage());
    init_tracing(Some(log_path.as_path()));
    let progress = !cli.no_progress;

    match cli.command {
        Command::Sample { creds, seeds, seed_key, filter, window, posts_per_seed, pace_ms, walk_retries, users_out, frame_out, table_out } => {
            let seeds = read_seeds(&seeds, &seed_key)?;
            let client = RedditClient::connect(&creds.into()).context("authenticate")?;
            let walk_policy = match walk_retries {
                0 => WalkPolicy::FailFast,
                n => WalkPolicy::Retry(RetryPolicy::default().with_retries(n)),
            };
            let opts = SampleOptions::default()
                .with_filter(filter)
                .with_time_window(window)
                .with_posts_per_seed(posts_per_seed)
                .with_pace(Duration::from_millis(pace_ms))
                .with_walk_policy(walk_policy)
                .with_users_csv(&users_out)
                .with_progress(progress);
            let mut sampler = SnowballSampler::new(client, ThreadSleeper, opts);
            let (frame, table) = sampler.sample(&seeds)?;
            frame.write_json(&frame_out)?;
            table.write_csv(&table_out)?;
            tracing::info!(
                frame = %frame_out.display(),
                table = %table_out.display(),
                users = %users_out.display(),
                "sample written"
            );
        }
        Command::Users { command: UsersCommand::Dedupe { input, output } } => {
            let raw = read_users_csv(&input)?;
            let users = process_user_ids_with(&raw, &Exclusions::from_env());
            write_users_csv(&output, &users)?;
            tracing::info!(original = raw.len(), distinct = users.len(), "wrote {}", output.display());
        }
        Command::Users { command: UsersCommand::Subset { input, output, fraction, seed } } => {
            let raw = read_users_csv(&input)?;
            let subset = subset_users(&raw, fraction, seed)?;
            write_users_csv(&output, &subset)?;
            tracing::info!("Original list length: {}, subset length: {}", raw.len(), subset.len());
        }
        Command::Comments { creds, input, output, limit, retries } => {
            let users = read_users_csv(&input)?;
            let client = RedditClient::connect(&creds.into()).context("authenticate")?;
            let opts = CollectOptions::default()
                .with_comment_limit(limit)
                .with_retry(RetryPolicy::default().with_retries(retries))
                .with_progress(progress);
            let report = Collector::new(client, ThreadSleeper, opts).collect_comments(&users, &output)?;
            tracing::info!(?report, "comment collection finished");
        }
        Command::Metadata { creds, input, output, retries } => {
            let users = read_users_csv(&input)?;
            let client = RedditClient::connect(&creds.into()).context("authenticate")?;
            let opts = CollectOptions::default()
                .with_retry(RetryPolicy::default().with_retries(retries))
                .with_progress(progress);
            let report = Collector::new(client, ThreadSleeper, opts)
                .with_exclusions(Exclusions::from_env())
                .collect_metadata(&users, &output)?;
            tracing::info!(?report, "metadata collection finished");
        }
        Command::Clean { input, output } => {
            clean_comments_file(&input, &output)?;
        }
        Command::Downsample { input, output, fraction, seed } => {
            downsample_rows(&input, &output, fraction, seed)?;
        }
        Command::Classify { command: ClassifyCommand::Toxicity(args) } => {
            let opts = ClassifyOptions::default().with_batch_size(args.batch_size).with_progress(progress);
            let classifier = hosted(&args, TOXICITY_MODEL, &opts)?;
            let report = classify_to_csv(&classifier, &args.input, &args.output, &opts)?;
            tracing::info!(rows = report.rows, batches = report.batches, "wrote {}", args.output.display());
        }
        Command::Classify { command: ClassifyCommand::Namecalling(args) } => {
            let opts = ClassifyOptions::default().with_batch_size(args.batch_size).with_progress(progress);
            let classifier = hosted(&args, NAMECALLING_MODEL, &opts)?;
            let n = classify_to_json(&classifier, &args.input, &args.output, &opts)?;
            tracing::info!(rows = n, "wrote {}", args.output.display());
        }
    }
    Ok(())
}
