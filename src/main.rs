use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use event_discovery::apis::EventsApiClient;
use event_discovery::cache::{EventCache, FileStore};
use event_discovery::config::Config;
use event_discovery::logging;
use event_discovery::map::maps_search_url;
use event_discovery::{Dashboard, FilterState, Location, MapProjector, NewEvent, Snapshot};
use tracing::error;

#[derive(Parser)]
#[command(name = "event_discovery")]
#[command(about = "Browse, filter and create events")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List events matching the given filters
    List {
        #[command(flatten)]
        filters: FilterArgs,
        /// Skip the cache and fetch fresh data
        #[arg(long)]
        refresh: bool,
        /// Also print map marker positions
        #[arg(long)]
        map: bool,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Inspect or clear the local event cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
    /// Create a new event on the backend
    Submit(SubmitArgs),
}

#[derive(Subcommand)]
enum CacheAction {
    /// Remove the cached payload
    Clear,
    /// Show age and filters of the cached payload
    Status,
}

#[derive(Args)]
struct FilterArgs {
    /// Substring of the event address (case-insensitive)
    #[arg(long)]
    location: Option<String>,
    /// Category name, or "all"
    #[arg(long)]
    category: Option<String>,
    /// Earliest start date (YYYY-MM-DD)
    #[arg(long)]
    start_date: Option<String>,
    /// Latest start date, inclusive (YYYY-MM-DD)
    #[arg(long)]
    end_date: Option<String>,
}

impl From<FilterArgs> for FilterState {
    fn from(args: FilterArgs) -> Self {
        FilterState {
            location: args.location,
            category: args.category,
            start_date: args.start_date,
            end_date: args.end_date,
        }
    }
}

#[derive(Args)]
struct SubmitArgs {
    #[arg(long)]
    name: String,
    #[arg(long, default_value = "")]
    description: String,
    #[arg(long, default_value = "")]
    dress_code: String,
    #[arg(long)]
    start_date: String,
    #[arg(long)]
    start_time: String,
    #[arg(long, default_value = "")]
    end_date: String,
    #[arg(long, default_value = "")]
    end_time: String,
    #[arg(long)]
    address: String,
    #[arg(long, allow_hyphen_values = true)]
    latitude: f64,
    #[arg(long, allow_hyphen_values = true)]
    longitude: f64,
    /// Image reference (URL or uploaded media path)
    #[arg(long)]
    image: String,
}

impl From<SubmitArgs> for NewEvent {
    fn from(args: SubmitArgs) -> Self {
        NewEvent {
            name: args.name,
            description: args.description,
            dress_code: args.dress_code,
            start_date: args.start_date,
            start_time: args.start_time,
            end_date: args.end_date,
            end_time: args.end_time,
            location: Some(Location::new(args.address, args.latitude, args.longitude)),
            image: args.image,
        }
    }
}

fn print_snapshot(snapshot: &Snapshot, show_map: bool) {
    let suffix = match (snapshot.filtered, snapshot.from_cache) {
        (true, true) => " (filtered) (cached)",
        (true, false) => " (filtered)",
        (false, true) => " (cached)",
        (false, false) => "",
    };
    println!("📅 {}{}", snapshot.count_label(), suffix);

    for event in &snapshot.events {
        println!("\n• {} [{}]", event.name, event.category);
        println!("   When:  {}", event.start_time);
        println!("   Where: {}", event.location.address);
        if let Some(dress_code) = &event.dress_code {
            println!("   Dress: {}", dress_code);
        }
        if let Some(url) = maps_search_url(event) {
            println!("   Map:   {}", url);
        }
    }

    if show_map {
        println!("\n🗺️  Markers (x%, y%):");
        for marker in &snapshot.markers {
            println!("   {:>8}  {:>6.2}  {:>6.2}", marker.id, marker.x, marker.y);
        }
        let unplotted = snapshot.events.len() - snapshot.markers.len();
        if unplotted > 0 {
            println!("   ({} events without coordinates not shown)", unplotted);
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    logging::init_logging();

    let cli = Cli::parse();
    let config = Config::load().context("loading configuration")?;

    let store = FileStore::new(&config.cache.dir);
    let cache = EventCache::new(store).with_ttl(config.cache.ttl());

    match cli.command {
        Commands::List {
            filters,
            refresh,
            map,
            json,
        } => {
            let client = EventsApiClient::new(&config.api)?;
            let mut dashboard = Dashboard::new(client, cache, MapProjector::new(config.map));
            dashboard.set_filters(filters.into());

            match dashboard.load(!refresh).await {
                Ok(snapshot) if json => {
                    println!("{}", serde_json::to_string_pretty(&snapshot)?);
                }
                Ok(snapshot) => print_snapshot(&snapshot, map),
                Err(e) => {
                    error!("Loading events failed: {}", e);
                    println!("❌ Failed to load events: {}", e);
                    std::process::exit(1);
                }
            }
        }
        Commands::Cache { action } => match action {
            CacheAction::Clear => {
                cache.clear();
                println!("🧹 Cache cleared");
            }
            CacheAction::Status => match cache.peek() {
                Some(entry) => {
                    let age = cache.age().unwrap_or_default();
                    println!("📦 {} events cached {}s ago", entry.events.len(), age.as_secs());
                    println!("   Filters: {}", serde_json::to_string(&entry.filters)?);
                    println!("   Expired: {}", cache.is_expired());
                }
                None => println!("📦 Cache is empty"),
            },
        },
        Commands::Submit(args) => {
            let client = EventsApiClient::new(&config.api)?;
            let event: NewEvent = args.into();
            match client.submit_event(&event).await {
                Ok(()) => println!("✅ Event created successfully!"),
                Err(e) => {
                    error!("Event submission failed: {}", e);
                    println!("❌ Error: {}", e);
                    std::process::exit(1);
                }
            }
        }
    }
    Ok(())
}
