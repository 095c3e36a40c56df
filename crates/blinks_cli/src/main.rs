use blinks_api::{create_backend, ApiConfig};
use blinks_core::{
    categories, Blink, BlinkFilter, BlinkKind, BlinkStore, BlinksApi, Error, Page, Result, SearchRequest, Tab,
    TaskStatus, VoteType,
};
use blinks_sync::{init_logging, PollState, PollerConfig, TaskPoller, VoteOutcome, VoteSynchronizer};
use clap::Parser;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, Level};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct HumanDuration(Duration);

impl FromStr for HumanDuration {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let mut total_millis = 0u64;
        let mut current_number = String::new();
        let mut chars = s.trim().chars().peekable();
        let mut has_value = false;

        while let Some(c) = chars.next() {
            if c.is_ascii_digit() {
                current_number.push(c);
                continue;
            }
            if c.is_whitespace() {
                continue;
            }
            let num: u64 = current_number
                .parse()
                .map_err(|_| format!("Expected a number before '{}'", c))?;
            let unit_millis = match c {
                'm' if chars.peek() == Some(&'s') => {
                    chars.next();
                    1
                }
                's' => 1_000,
                'm' => 60_000,
                'h' => 3_600_000,
                'd' => 86_400_000,
                _ => return Err(format!("Invalid duration unit: {}", c)),
            };
            total_millis = add_millis(total_millis, num, unit_millis)?;
            current_number.clear();
            has_value = true;
        }

        // A bare trailing number means seconds
        if !current_number.is_empty() {
            let num: u64 = current_number
                .parse()
                .map_err(|_| "Invalid number in duration".to_string())?;
            total_millis = add_millis(total_millis, num, 1_000)?;
            has_value = true;
        }

        if !has_value {
            return Err("Duration must include a number".to_string());
        }
        if total_millis == 0 {
            return Err("Duration must be greater than zero".to_string());
        }

        Ok(HumanDuration(Duration::from_millis(total_millis)))
    }
}

fn add_millis(total: u64, num: u64, unit_millis: u64) -> std::result::Result<u64, String> {
    num.checked_mul(unit_millis)
        .and_then(|millis| total.checked_add(millis))
        .ok_or_else(|| "Duration too large".to_string())
}

fn parse_constraint(s: &str) -> std::result::Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("Expected key=value, got {}", s))?;
    let key = key.trim();
    if key.is_empty() {
        return Err("Constraint key must not be empty".to_string());
    }
    Ok((key.to_string(), value.trim().to_string()))
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Read, vote on and search blinks", long_about = None)]
pub struct Cli {
    /// Backend to talk to: http or memory
    #[arg(long, default_value = "http")]
    backend: String,
    /// Base URL of the blinks API (overrides BLINKS_API_URL)
    #[arg(long)]
    api_url: Option<String>,
    /// JSON file of blinks to load into the memory backend
    #[arg(long)]
    seed: Option<PathBuf>,
    /// Request timeout (e.g. 15s, 500ms)
    #[arg(long, default_value = "15s")]
    timeout: HumanDuration,
    /// More output; repeat for debug logs
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// List blinks for a tab, optionally narrowed by category or text
    List {
        #[arg(long, default_value = "latest")]
        tab: Tab,
        #[arg(long)]
        category: Option<String>,
        /// Case-insensitive text to look for in titles and summaries
        #[arg(long)]
        search: Option<String>,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 20)]
        limit: u32,
        /// Print the filtered blinks as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a single blink
    Show { id: String },
    /// Vote on a blink (positive or negative)
    Vote { id: String, vote: VoteType },
    /// Start a topic search and follow it until it finishes
    Search {
        topic: String,
        /// Extra search constraints as key=value
        #[arg(short, long = "constraint", value_parser = parse_constraint)]
        constraints: Vec<(String, String)>,
        /// Time between status polls (e.g. 5s, 1m)
        #[arg(long, default_value = "5s")]
        interval: HumanDuration,
        /// Stop after this many failed polls in a row
        #[arg(long, default_value_t = blinks_sync::poller::DEFAULT_MAX_CONSECUTIVE_FAILURES, conflicts_with = "no_limit")]
        max_failures: u32,
        /// Keep polling through failures until the task finishes
        #[arg(long)]
        no_limit: bool,
    },
}

fn log_level(verbose: u8) -> Level {
    match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    }
}

fn print_blink_line(blink: &Blink) {
    let icon = match blink.kind {
        BlinkKind::News => "📰",
        BlinkKind::Rumor => "🗣️",
    };
    let category = blink.category.as_deref().unwrap_or("uncategorized");
    println!(
        "{} [{}] {} ({}, {}) {}",
        icon,
        blink.id,
        blink.title,
        category,
        blink.published_at.format("%Y-%m-%d %H:%M"),
        blink.votes
    );
}

fn print_blink(blink: &Blink) {
    print_blink_line(blink);
    if !blink.summary.is_empty() {
        println!("\n{}", blink.summary);
    }
    if let Some(content) = &blink.content {
        println!("\n{}", content);
    }
    if let Some(image) = &blink.image_url {
        println!("\n🖼️ {}", image);
    }
}

async fn list(
    api: Arc<dyn BlinksApi>,
    store: &BlinkStore,
    filter: BlinkFilter,
    page: Page,
    json: bool,
) -> Result<()> {
    let blinks = api.list_blinks(page).await?;
    info!("📥 Fetched {} blinks from {}", blinks.len(), api.name());
    store.extend(blinks).await;

    let view = store.filtered(&filter).await;
    if json {
        println!("{}", serde_json::to_string_pretty(view.as_ref())?);
        return Ok(());
    }

    if view.is_empty() {
        println!("No blinks match (tab: {}).", filter.tab);
    }
    for blink in view.iter() {
        print_blink_line(blink);
    }

    let available = categories(&store.all().await);
    if !available.is_empty() {
        println!("\nCategories: {}", available.join(", "));
    }
    Ok(())
}

async fn vote(api: Arc<dyn BlinksApi>, store: &BlinkStore, id: &str, vote: VoteType) -> Result<()> {
    let blink = api.get_blink(id).await?;
    store.upsert(blink.clone()).await;

    let sync = VoteSynchronizer::new(api, store.clone());
    sync.track(&blink).await;
    println!("Current: {}", blink.votes);

    match sync.vote(id, vote).await {
        VoteOutcome::Confirmed(state) => {
            println!("✅ Voted {}: {}", state.user_vote, state.counts);
        }
        VoteOutcome::RolledBack { state, reason } => {
            println!("⚠️ Vote not recorded ({}). Tallies restored: {}", reason, state.counts);
            println!("   Run the command again to retry.");
        }
        VoteOutcome::Ignored(reason) => {
            println!("⏭️ Vote ignored: {}", reason);
        }
    }
    Ok(())
}

enum Wake {
    Update,
    Interrupted,
    Closed,
}

fn print_progress(state: &PollState, last: &mut Option<(TaskStatus, String)>) {
    if let Some(error) = &state.last_error {
        println!(
            "⚠️ Poll failed ({} in a row): {}",
            state.consecutive_failures, error
        );
        return;
    }
    if let Some(task) = &state.task {
        let current = (task.status, task.message.clone());
        if last.as_ref() != Some(&current) {
            println!("{} {} {}", task.status.icon(), task.status, task.message);
            *last = Some(current);
        }
    }
}

async fn search(api: Arc<dyn BlinksApi>, request: SearchRequest, config: PollerConfig) -> Result<()> {
    let mut poller = TaskPoller::new(api, config);
    let mut updates = poller.subscribe();

    let task_id = poller.start(request).await?;
    let started = poller.current();
    println!("🔎 Task {} started. {}", task_id, started.started_message);

    let mut last = None;
    let state = loop {
        let wake = tokio::select! {
            changed = updates.changed() => if changed.is_ok() { Wake::Update } else { Wake::Closed },
            _ = tokio::signal::ctrl_c() => Wake::Interrupted,
        };

        match wake {
            Wake::Interrupted => {
                poller.cancel();
                println!("🛑 Search cancelled");
                return Ok(());
            }
            Wake::Closed => break poller.current(),
            Wake::Update => {
                let state = updates.borrow_and_update().clone();
                print_progress(&state, &mut last);
                if state.is_settled() {
                    break state;
                }
            }
        }
    };

    if state.gave_up {
        return Err(Error::Task(format!(
            "stopped polling after {} failed attempts: {}",
            state.consecutive_failures,
            state.last_error.unwrap_or_default()
        )));
    }

    match state.task {
        Some(task) if task.status == TaskStatus::Error => Err(Error::Task(task.message)),
        Some(task) => {
            let blinks = task.result.map(|r| r.blinks).unwrap_or_default();
            if blinks.is_empty() {
                println!("No results.");
            }
            for blink in &blinks {
                print_blink_line(blink);
            }
            Ok(())
        }
        None => Err(Error::Task("search ended without a status".to_string())),
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = ApiConfig::new().with_timeout(cli.timeout.0);
    if let Some(url) = cli.api_url.as_deref() {
        config = config.with_url(url);
    }
    let api = create_backend(cli.backend.as_str(), &config, cli.seed.as_deref()).await?;
    let store = BlinkStore::new();

    match cli.command {
        Commands::List {
            tab,
            category,
            search,
            page,
            limit,
            json,
        } => {
            let mut filter = BlinkFilter::new(tab);
            if let Some(category) = category {
                filter = filter.with_category(category);
            }
            if let Some(query) = search {
                filter = filter.with_query(query);
            }
            list(api, &store, filter, Page::new(page, limit)?, json).await
        }
        Commands::Show { id } => {
            let blink = api.get_blink(&id).await?;
            print_blink(&blink);
            Ok(())
        }
        Commands::Vote { id, vote: vote_type } => vote(api, &store, &id, vote_type).await,
        Commands::Search {
            topic,
            constraints,
            interval,
            max_failures,
            no_limit,
        } => {
            let request = constraints
                .into_iter()
                .fold(SearchRequest::new(topic), |request, (key, value)| {
                    request.with_constraint(key, value)
                });
            let config = PollerConfig::default()
                .with_interval(interval.0)
                .with_max_consecutive_failures(if no_limit { None } else { Some(max_failures) });
            search(api, request, config).await
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(log_level(cli.verbose));

    if let Err(e) = run(cli).await {
        eprintln!("❌ {}", e);
        if e.is_transient() {
            eprintln!("   The backend could not be reached. Run the command again to retry.");
        }
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_human_duration() {
        assert_eq!("5s".parse::<HumanDuration>().unwrap().0, Duration::from_secs(5));
        assert_eq!("1m30s".parse::<HumanDuration>().unwrap().0, Duration::from_secs(90));
        assert_eq!("1h 15m".parse::<HumanDuration>().unwrap().0, Duration::from_secs(4500));
        assert_eq!("250ms".parse::<HumanDuration>().unwrap().0, Duration::from_millis(250));
        assert_eq!("42".parse::<HumanDuration>().unwrap().0, Duration::from_secs(42));
        assert!("".parse::<HumanDuration>().is_err());
        assert!("0s".parse::<HumanDuration>().is_err());
        assert!("5x".parse::<HumanDuration>().is_err());
        assert!("s".parse::<HumanDuration>().is_err());
        assert_eq!(
            "999999999999999h".parse::<HumanDuration>().unwrap_err(),
            "Duration too large"
        );
        assert_eq!(
            "18446744073709551615".parse::<HumanDuration>().unwrap_err(),
            "Duration too large"
        );
        assert_eq!(
            "18446744073709551615ms 1ms".parse::<HumanDuration>().unwrap_err(),
            "Duration too large"
        );
    }

    #[test]
    fn test_parse_constraint() {
        assert_eq!(
            parse_constraint("region = north").unwrap(),
            ("region".to_string(), "north".to_string())
        );
        assert!(parse_constraint("no-equals").is_err());
        assert!(parse_constraint("=value").is_err());
    }

    #[test]
    fn test_cli_parses_search() {
        let cli = Cli::try_parse_from([
            "blinks", "--backend", "memory", "search", "floods", "-c", "region=north", "--interval", "2s", "--no-limit",
        ])
        .unwrap();
        match cli.command {
            Commands::Search {
                topic,
                constraints,
                interval,
                no_limit,
                ..
            } => {
                assert_eq!(topic, "floods");
                assert_eq!(constraints, vec![("region".to_string(), "north".to_string())]);
                assert_eq!(interval.0, Duration::from_secs(2));
                assert!(no_limit);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_cli_parses_vote_and_tab() {
        let cli = Cli::try_parse_from(["blinks", "vote", "42", "negative"]).unwrap();
        assert!(matches!(cli.command, Commands::Vote { vote: VoteType::Negative, .. }));

        let cli = Cli::try_parse_from(["blinks", "list", "--tab", "rumors"]).unwrap();
        assert!(matches!(cli.command, Commands::List { tab: Tab::Rumors, .. }));

        assert!(Cli::try_parse_from(["blinks", "vote", "42", "sideways"]).is_err());
    }

    #[test]
    fn test_log_level() {
        assert_eq!(log_level(0), Level::WARN);
        assert_eq!(log_level(3), Level::DEBUG);
    }
}
