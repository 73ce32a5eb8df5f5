//! A command-line front end for the Civix dashboard core.
//! It talks to a running server through the same client, cache and session
//! store that any graphical front end would use.

use std::sync::Arc;

use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use log::{warn, LevelFilter};
use log4rs::{
    append::console::{ConsoleAppender, Target},
    config::{Appender, Config as LogConfig, Logger, Root},
    encode::pattern::PatternEncoder,
};
use rocket::tokio;
use thiserror::Error;

use civix_backend::dashboard::{
    aggregate::{petition_stats, poll_stats},
    search::{search, SearchHit, DROPDOWN_LIMIT},
    ApiClient, ClientError, DashboardConfig, Geocoder, QueryCache, RefreshScheduler, Resource,
    SessionStore, Snapshot,
};
use civix_backend::model::api::auth::Credentials;

const PROGRAM_NAME: &str = "civix-dashboard";

const ABOUT_TEXT: &str = "Browse and follow a Civix server from the terminal.

The server and session file are configured with CIVIX_API_URL,
CIVIX_REFRESH_SECS, CIVIX_SESSION_PATH and CIVIX_NOMINATIM_URL.

EXIT CODES:
     0: Success.
     2: Not logged in, or the session has expired.
 Other: Error.";

const VERBOSE: &str = "VERBOSE";
const EMAIL: &str = "EMAIL";
const PASSWORD: &str = "PASSWORD";
const QUERY: &str = "QUERY";
const ALL: &str = "ALL";
const RESOURCES: &str = "RESOURCES";
const LATITUDE: &str = "LATITUDE";
const LONGITUDE: &str = "LONGITUDE";

/// Names accepted by `watch`, in the same order as `Resource::ALL`.
const RESOURCE_NAMES: [&str; 7] = [
    "petitions",
    "polls",
    "notifications",
    "feedback",
    "settings",
    "actions",
    "analytics",
];

/// Construct the CLI configuration.
fn cli() -> Command {
    // Make the build dirty when the toml changes.
    include_str!("../Cargo.toml");

    clap::command!(PROGRAM_NAME)
        .about(ABOUT_TEXT)
        .subcommand_required(true)
        .arg(
            Arg::new(VERBOSE)
                .help("Log more; repeat for even more")
                .short('v')
                .long("verbose")
                .action(ArgAction::Count)
                .global(true),
        )
        .subcommand(
            Command::new("login")
                .about("Log in and remember the session")
                .arg(Arg::new(EMAIL).required(true))
                .arg(Arg::new(PASSWORD).required(true)),
        )
        .subcommand(Command::new("logout").about("Forget the saved session"))
        .subcommand(Command::new("stats").about("Summarise petitions and polls"))
        .subcommand(
            Command::new("search")
                .about("Search petitions and polls")
                .arg(Arg::new(QUERY).required(true))
                .arg(
                    Arg::new(ALL)
                        .help("Show every match, not just the first few")
                        .long("all")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("watch")
                .about("Print resources as they change, until interrupted")
                .arg(
                    Arg::new(RESOURCES)
                        .action(ArgAction::Append)
                        .value_parser(RESOURCE_NAMES),
                ),
        )
        .subcommand(
            Command::new("locate")
                .about("Describe the place at a coordinate")
                .arg(
                    Arg::new(LATITUDE)
                        .required(true)
                        .allow_negative_numbers(true)
                        .value_parser(value_parser!(f64)),
                )
                .arg(
                    Arg::new(LONGITUDE)
                        .required(true)
                        .allow_negative_numbers(true)
                        .value_parser(value_parser!(f64)),
                ),
        )
}

/// Errors that this program may produce.
#[derive(Debug, Error)]
enum Error {
    #[error("invalid configuration: {0}")]
    Config(#[from] rocket::figment::Error),
    #[error(transparent)]
    Client(#[from] ClientError),
}

impl Error {
    fn exit_code(&self) -> u8 {
        match self {
            Self::Client(ClientError::Unauthorized) => 2,
            _ => 1,
        }
    }
}

fn resource_named(name: &str) -> Option<Resource> {
    RESOURCE_NAMES
        .iter()
        .position(|&known| known == name)
        .map(|i| Resource::ALL[i])
}

/// One line describing a snapshot.
fn summary(snapshot: &Snapshot) -> String {
    match snapshot {
        Snapshot::Petitions(petitions) => {
            let stats = petition_stats(petitions, None);
            format!(
                "petitions: {} total, {} active, {} under review, {} closed",
                stats.total, stats.active, stats.under_review, stats.closed
            )
        }
        Snapshot::Polls(polls) => {
            let stats = poll_stats(polls, None);
            format!(
                "polls: {} total, {} active, {} closed",
                stats.total, stats.active, stats.closed
            )
        }
        Snapshot::Notifications(notifications) => {
            let unread = notifications.iter().filter(|n| !n.read).count();
            format!("notifications: {} ({unread} unread)", notifications.len())
        }
        Snapshot::MyFeedback(feedback) => format!("feedback: {} submitted", feedback.len()),
        Snapshot::Settings(settings) => format!(
            "settings: theme {:?}, language {}",
            settings.theme, settings.language
        ),
        Snapshot::OfficialActions(actions) => match actions.first() {
            Some(latest) => format!(
                "official actions: latest '{}' {}",
                latest.title, latest.time_ago
            ),
            None => "official actions: none yet".to_string(),
        },
        Snapshot::Analytics(analytics) => format!(
            "analytics: {} petitions, {} signatures",
            analytics.stats.total, analytics.total_signatures
        ),
    }
}

async fn login(client: &ApiClient, store: &SessionStore, args: &ArgMatches) -> Result<(), Error> {
    // Required arguments are guaranteed to be present.
    let credentials = Credentials {
        email: args.get_one::<String>(EMAIL).cloned().unwrap_or_default(),
        password: args.get_one::<String>(PASSWORD).cloned().unwrap_or_default(),
    };
    let session = client.login(&credentials).await?;
    println!("Logged in as {} ({})", session.user.name, session.user.role);
    store.log_in(session)?;
    Ok(())
}

async fn logout(client: &ApiClient, store: &SessionStore) -> Result<(), Error> {
    if store.session().is_none() {
        println!("Not logged in.");
        return Ok(());
    }
    if let Err(e) = client.logout().await {
        warn!("Server-side logout failed: {e}");
    }
    store.log_out()?;
    println!("Logged out.");
    Ok(())
}

async fn stats(client: &ApiClient, store: &SessionStore) -> Result<(), Error> {
    let (petitions, polls) = tokio::try_join!(client.petitions(), client.polls())?;
    let me = store.user().map(|user| user.id.to_string());

    let petitions = petition_stats(&petitions, me.as_ref());
    println!(
        "Petitions: {} total, {} active, {} under review, {} closed, {} reached their goal",
        petitions.total,
        petitions.active,
        petitions.under_review,
        petitions.closed,
        petitions.goal_reached
    );
    let polls = poll_stats(&polls, me.as_ref());
    println!(
        "Polls: {} total, {} active, {} closed, {} drafts",
        polls.total, polls.active, polls.closed, polls.draft
    );
    if me.is_some() {
        println!(
            "You created {} petitions and {} polls, and voted in {} polls",
            petitions.mine, polls.mine, polls.voted
        );
    }
    Ok(())
}

async fn find(client: &ApiClient, args: &ArgMatches) -> Result<(), Error> {
    let query = args.get_one::<String>(QUERY).map(String::as_str).unwrap_or_default();
    let limit = (!args.get_flag(ALL)).then_some(DROPDOWN_LIMIT);
    let (petitions, polls) = tokio::try_join!(client.petitions(), client.polls())?;

    let hits = search(query, &petitions, &polls, limit);
    if hits.is_empty() {
        println!("No petitions or polls match '{query}'.");
    }
    for hit in hits {
        match hit {
            SearchHit::Petition(petition) => println!(
                "petition {}: {} [{}, {}%]",
                petition.id, petition.title, petition.status_label, petition.progress
            ),
            SearchHit::Poll(poll) => println!(
                "poll     {}: {} [{}, {} votes]",
                poll.id, poll.question, poll.status_label, poll.total_votes
            ),
        }
    }
    Ok(())
}

async fn watch(
    client: Arc<ApiClient>,
    config: &DashboardConfig,
    args: &ArgMatches,
) -> Result<(), Error> {
    let mut resources: Vec<Resource> = args
        .get_many::<String>(RESOURCES)
        .into_iter()
        .flatten()
        .filter_map(|name| resource_named(name))
        .collect();
    if resources.is_empty() {
        resources = vec![Resource::Petitions, Resource::Polls, Resource::Notifications];
    }

    let cache = Arc::new(QueryCache::new(client));
    let scheduler = RefreshScheduler::new(cache.clone());
    let mut handles = Vec::with_capacity(resources.len());
    for resource in resources {
        let mut updates = cache.subscribe(resource).await;
        tokio::spawn(async move {
            while updates.changed().await.is_ok() {
                let snapshot = updates.borrow_and_update().clone();
                if let Some(snapshot) = snapshot {
                    println!("{}", summary(&snapshot));
                }
            }
        });
        handles.push(scheduler.watch(resource, config.refresh_interval()));
    }

    tokio::signal::ctrl_c().await.map_err(ClientError::from)?;
    // Dropping the handles stops the timers.
    drop(handles);
    Ok(())
}

async fn locate(config: &DashboardConfig, args: &ArgMatches) -> Result<(), Error> {
    let lat = args.get_one::<f64>(LATITUDE).copied().unwrap_or_default();
    let lon = args.get_one::<f64>(LONGITUDE).copied().unwrap_or_default();
    let geocoder = Geocoder::new(&config.nominatim_url)?;
    println!("{}", geocoder.reverse_geocode(lat, lon).await?);
    Ok(())
}

/// Run the chosen subcommand.
async fn run(args: &ArgMatches, config: &DashboardConfig) -> Result<(), Error> {
    let client = Arc::new(ApiClient::new(&config.api_url)?);
    let store = SessionStore::open(&config.session_path);
    client.set_token(store.token());

    match args.subcommand() {
        Some(("login", sub)) => login(&client, &store, sub).await,
        Some(("logout", _)) => logout(&client, &store).await,
        Some(("stats", _)) => stats(&client, &store).await,
        Some(("search", sub)) => find(&client, sub).await,
        Some(("watch", sub)) => watch(client, config, sub).await,
        Some(("locate", sub)) => locate(config, sub).await,
        // A subcommand is required.
        _ => Ok(()),
    }
}

/// Log to stderr, keeping stdout for results.
fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    let stderr = ConsoleAppender::builder()
        .target(Target::Stderr)
        .encoder(Box::new(PatternEncoder::new("{h({l})} {t} - {m}{n}")))
        .build();
    let config = LogConfig::builder()
        .appender(Appender::builder().build("stderr", Box::new(stderr)))
        .logger(Logger::builder().build("civix_backend", level))
        .build(Root::builder().appender("stderr").build(LevelFilter::Warn));
    match config {
        Ok(config) => {
            if let Err(e) = log4rs::init_config(config) {
                eprintln!("Failed to initialise logging: {e}");
            }
        }
        Err(e) => eprintln!("Invalid logging config: {e}"),
    }
}

#[rocket::main]
async fn main() {
    let args = cli().get_matches();
    init_logging(args.get_count(VERBOSE));

    let result = match DashboardConfig::from_env() {
        Ok(config) => run(&args, &config).await,
        Err(e) => Err(e.into()),
    };
    if let Err(e) = result {
        eprintln!("{PROGRAM_NAME}: {e}");
        std::process::exit(e.exit_code().into());
    }
}
