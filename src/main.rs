use clap::{Args, Parser, Subcommand};
use indicatif::{MultiProgress, ProgressBar};
use itertools::Itertools;
use pr_activity_report::analyze::{Analyzer, DataAnalysis};
use pr_activity_report::github::{GitHubClient, PullRequest, PullRequester};
use pr_activity_report::identity::{IdentityKeyMode, IdentityResolver};
use pr_activity_report::model::{
    CollectionMap, DayKeyPolicy, ReportPeriod, Repository, Result, Roster, User,
};
use pr_activity_report::report::{
    build_csv, build_raw_csv, is_reported, markdown_to_csv, FlattenOptions, MarkdownReport,
};
use pr_activity_report::telemetry::{
    enrich, AnnotatedRecord, TelemetryOutcome, TelemetrySettings, UsageClient,
};
use pr_activity_report::utils::{MultiProgressNew, ProgressStyleTemplate};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(version, about = "Pull request and code review activity reports")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Collect pull request activity and write the markdown and CSV reports.
    Report(ReportArgs),
    /// Convert a rendered markdown report back to CSV.
    MarkdownToCsv(ConvertArgs),
}

#[derive(Args, Debug, Clone)]
struct ReportArgs {
    #[arg(long = "repos", default_value = "repositories.json")]
    repos_path: String,
    #[arg(long = "users")]
    users_path: Option<String>,
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    github_token: String,
    /// First day of the report, `YYYY-MM-DD`.
    #[arg(long)]
    since: String,
    /// Last day of the report (inclusive), `YYYY-MM-DD`.
    #[arg(long)]
    until: String,
    /// Period key a single-day report reads its snapshot from.
    #[arg(long, value_enum, default_value = "calendar")]
    day_key: DayKeyPolicy,
    #[arg(long, env = "INCLUDE_CURSOR_ANALYTICS")]
    include_cursor_analytics: bool,
    #[arg(long, env = "CURSOR_API_KEY", hide_env_values = true)]
    cursor_api_key: Option<String>,
    #[arg(long, default_value_t = 7)]
    telemetry_days: i64,
    #[arg(long, value_enum, default_value = "local-part")]
    identity_key: IdentityKeyMode,
    /// Keys that never get a row of their own.
    #[arg(long, value_delimiter = ',')]
    exclude: Vec<String>,
    /// Parallel commit lookups while resolving emails.
    #[arg(long, default_value_t = 4)]
    concurrency: usize,
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,
}

#[derive(Args, Debug, Clone)]
struct ConvertArgs {
    #[arg(long)]
    input: PathBuf,
    /// `telemetry.json` written by `report`.
    #[arg(long)]
    telemetry: Option<PathBuf>,
    #[arg(long, default_value = "report.csv")]
    output: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match &cli.command {
        Command::Report(args) => report(args).await,
        Command::MarkdownToCsv(args) => convert(args),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}

async fn report(args: &ReportArgs) -> Result<()> {
    let repos = Repository::from_config(&args.repos_path)?;
    let users = match &args.users_path {
        Some(path) => User::from_config(path)?,
        None => vec![],
    };
    info!(
        "Loaded {} repositories and {} configured users",
        repos.len(),
        users.len()
    );
    let roster = Roster::new(&users);
    let period = ReportPeriod::parse(&args.since, &args.until)?;
    let client = GitHubClient::new(&args.github_token)?;

    let multi_progress = MultiProgress::default();
    let mut analysis = DataAnalysis::new();
    for repo in &repos {
        let pull_requests = repo_fetch(&multi_progress, &client, repo, &period).await?;
        analysis.insert_pull_request(repo, pull_requests);
    }
    info!("Analyzing {} pull requests", analysis.pull_request_count());
    let mut data = analysis.collect();

    let outcome = telemetry_enrich(args, &multi_progress, &client, &repos, &mut data).await;

    let options = FlattenOptions {
        granularity: period.granularity(args.day_key),
        report_day: Some(period.end_day()),
        roster: &roster,
        excluded: &args.exclude,
        key_mode: args.identity_key,
    };
    write_reports(args, &period, &data, outcome.as_ref(), &options)
}

async fn repo_fetch(
    multi_progress: &MultiProgress,
    client: &GitHubClient,
    repo: &Repository,
    period: &ReportPeriod,
) -> Result<Vec<PullRequest>> {
    let name = repo.full_name();
    let pb = multi_progress.add_message(format!("{name}: waiting"));
    let progress_pb = pb.clone();
    let progress_name = name.clone();
    let progress = move |page: usize| {
        progress_pb.set_message(format!("{progress_name}: fetch pull requests (#{page} page) ..."));
    };
    let pull_requests = repo
        .fetch_pull_requests(client, period, Box::new(progress))
        .await?;
    pb.finish_with_message(format!(
        "✅ {name}: {} pull requests closed in the period",
        pull_requests.len()
    ));
    Ok(pull_requests)
}

async fn telemetry_enrich(
    args: &ReportArgs,
    multi_progress: &MultiProgress,
    client: &GitHubClient,
    repos: &[Repository],
    data: &mut CollectionMap,
) -> Option<TelemetryOutcome> {
    let settings = TelemetrySettings {
        enabled: args.include_cursor_analytics,
        key_mode: args.identity_key,
    };
    if !settings.enabled {
        return None;
    }
    let source = UsageClient::new(args.cursor_api_key.clone(), args.telemetry_days);
    let resolver = IdentityResolver::new(client, repos).with_concurrency(args.concurrency);

    let pb = multi_progress.add_with_style(
        ProgressBar::new(data.logins().count() as u64),
        ProgressStyleTemplate::count_bar(),
    );
    let progress_pb = pb.clone();
    let progress = move |login: &str| {
        progress_pb.set_message(format!("Resolved {login}"));
        progress_pb.inc(1);
    };
    let outcome = enrich(data, settings, &source, &resolver, progress).await;
    pb.finish_with_message("✅ Telemetry merged");
    outcome
}

fn write_reports(
    args: &ReportArgs,
    period: &ReportPeriod,
    data: &CollectionMap,
    outcome: Option<&TelemetryOutcome>,
    options: &FlattenOptions,
) -> Result<()> {
    fs::create_dir_all(&args.output_dir)?;

    let users = data
        .logins()
        .filter(|user| is_reported(user, options))
        .sorted()
        .cloned()
        .collect::<Vec<String>>();
    let title = format!(
        "Pull request activity {} .. {}",
        period.since.date_naive(),
        period.until.date_naive()
    );
    let markdown = data.report_render(&title, &users, &options.granularity.snapshot_key())?;
    write_output(&args.output_dir.join("report.md"), &markdown)?;

    let (aggregates, login_emails) = match outcome {
        Some(outcome) => (
            outcome.aggregates.clone(),
            outcome.identities.login_emails.clone(),
        ),
        None => Default::default(),
    };
    let csv = build_csv(data, &aggregates, &login_emails, options);
    write_output(&args.output_dir.join("report.csv"), &csv.render())?;

    if let Some(outcome) = outcome {
        if let Some(raw) = build_raw_csv(&outcome.raw) {
            write_output(&args.output_dir.join("telemetry.csv"), &raw.render())?;
        }
        let json = serde_json::to_string_pretty(&outcome.raw)?;
        write_output(&args.output_dir.join("telemetry.json"), &json)?;
    }
    Ok(())
}

fn convert(args: &ConvertArgs) -> Result<()> {
    let markdown = fs::read_to_string(&args.input)?;
    let telemetry: Vec<AnnotatedRecord> = match &args.telemetry {
        Some(path) => serde_json::from_str(&fs::read_to_string(path)?)?,
        None => vec![],
    };
    let table = markdown_to_csv(&markdown, &telemetry)?;
    info!(
        "Converted {} rows from `{}`",
        table.rows().len(),
        args.input.display()
    );
    write_output(&args.output, &table.render())
}

fn write_output(path: &Path, content: &str) -> Result<()> {
    fs::write(path, content)?;
    info!("Wrote `{}`", path.display());
    Ok(())
}
