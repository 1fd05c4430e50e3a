mod api;
mod commands;
mod config;
mod openfoodfacts;
mod server;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::process;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::api::RemoteClient;
use crate::commands::{
    DEFAULT_SYNC_INTERVAL_SECS, cmd_clear, cmd_delete, cmd_feed_comment, cmd_feed_like,
    cmd_feed_list, cmd_feed_post, cmd_food_add, cmd_food_list, cmd_goal_clear, cmd_goal_set,
    cmd_goal_show, cmd_history, cmd_log, cmd_mood, cmd_search, cmd_summary, cmd_sync_now,
    cmd_sync_status, cmd_sync_watch, cmd_water_add, cmd_water_set, cmd_weight_history,
    cmd_weight_log, cmd_weight_show,
};
use crate::config::Config;
use crate::openfoodfacts::OpenFoodFactsClient;
use nosh_core::service::NoshService;
use nosh_core::storage::Storage;

#[derive(Parser)]
#[command(
    name = "nosh",
    version,
    about = "A local-first nutrition tracker CLI",
    long_about = "\n\n  ███╗   ██╗ ██████╗ ███████╗██╗  ██╗
  ████╗  ██║██╔═══██╗██╔════╝██║  ██║
  ██╔██╗ ██║██║   ██║███████╗███████║
  ██║╚██╗██║██║   ██║╚════██║██╔══██║
  ██║ ╚████║╚██████╔╝███████║██║  ██║
  ╚═╝  ╚═══╝ ╚═════╝ ╚══════╝╚═╝  ╚═╝
        eat well, sync everywhere.
"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log a food for a meal
    Log {
        /// Food name (your foods are matched first, then `OpenFoodFacts`)
        food: String,
        /// Meal type: breakfast, lunch, dinner, snack
        #[arg(short, long, default_value = "snack")]
        meal: String,
        /// Number of servings (e.g. "1", "1.5")
        #[arg(short, long, default_value = "1")]
        quantity: String,
        /// Date to log for (YYYY-MM-DD or today/yesterday/tomorrow)
        #[arg(long)]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a meal entry by ID
    Delete {
        /// Entry ID to delete (shown in `nosh summary`)
        entry_id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Clear all meals for a date
    Clear {
        /// Date to clear (YYYY-MM-DD, default: today)
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show daily summary (defaults to today)
    Summary {
        /// Date to show (YYYY-MM-DD, default: today)
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show summary for the last N days
    History {
        /// Number of days to show
        #[arg(short, long, default_value = "7")]
        days: u32,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Track water intake
    Water {
        #[command(subcommand)]
        command: WaterCommands,
    },
    /// Record how you felt today
    Mood {
        /// Rating from 1 (awful) to 5 (great)
        rating: u8,
        /// Optional note
        #[arg(long)]
        note: Option<String>,
        /// Date (YYYY-MM-DD or today/yesterday/tomorrow, default: today)
        #[arg(long)]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Track body weight
    Weight {
        #[command(subcommand)]
        command: WeightCommands,
    },
    /// Manage your food palette
    Food {
        #[command(subcommand)]
        command: FoodCommands,
    },
    /// Search your foods and `OpenFoodFacts`
    Search {
        /// Search query
        query: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Manage daily nutrition goals
    Goal {
        #[command(subcommand)]
        command: GoalCommands,
    },
    /// Share and browse the social feed (requires a server)
    Feed {
        #[command(subcommand)]
        command: FeedCommands,
    },
    /// Sync your data with a remote server
    Sync {
        #[command(subcommand)]
        command: SyncCommands,
    },
    /// Pair this client with a nosh server
    Connect {
        /// Server base URL, e.g. http://192.168.1.10:8080
        url: String,
        /// API key printed by `nosh serve` on the server machine
        #[arg(long)]
        key: Option<String>,
        /// Display name for feed activity
        #[arg(long)]
        author: Option<String>,
    },
    /// Start the REST API server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,
        /// Address to bind to (default: 127.0.0.1, use 0.0.0.0 to expose to network)
        #[arg(short, long, default_value = "127.0.0.1")]
        bind: String,
        /// Disable API key authentication (for development/testing)
        #[arg(long)]
        no_auth: bool,
    },
}

#[derive(Subcommand)]
enum WaterCommands {
    /// Add to today's water total
    Add {
        /// Amount in millilitres
        ml: u32,
        /// Date (YYYY-MM-DD or today/yesterday/tomorrow, default: today)
        #[arg(long)]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Set the water total outright
    Set {
        /// Amount in millilitres
        ml: u32,
        /// Date (YYYY-MM-DD or today/yesterday/tomorrow, default: today)
        #[arg(long)]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum WeightCommands {
    /// Log a weight entry
    Log {
        /// Weight value (number)
        value: f64,
        /// Unit: kg or lbs (default: kg)
        #[arg(short, long, default_value = "kg")]
        unit: String,
        /// Date (YYYY-MM-DD or today/yesterday/tomorrow, default: today)
        #[arg(long)]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show weight for a specific date (default: today)
    Show {
        /// Date (YYYY-MM-DD or today/yesterday/tomorrow, default: today)
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show weight history, newest first
    History {
        /// Limit the number of entries shown
        #[arg(short, long)]
        limit: Option<usize>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum FoodCommands {
    /// Add a food to your palette
    Add {
        /// Food name
        name: String,
        /// Calories per serving
        #[arg(long)]
        calories: f64,
        /// Protein per serving (grams)
        #[arg(long, default_value = "0")]
        protein: f64,
        /// Carbs per serving (grams)
        #[arg(long, default_value = "0")]
        carbs: f64,
        /// Fat per serving (grams)
        #[arg(long, default_value = "0")]
        fat: f64,
        /// Serving description (e.g. "100 g", "1 cup")
        #[arg(long, default_value = "100 g")]
        serving: String,
        /// Category: fruit, vegetable, grain, protein, dairy, snack, beverage, other
        #[arg(long, default_value = "other")]
        category: String,
        /// Brand name
        #[arg(long)]
        brand: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List your palette
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum GoalCommands {
    /// Set daily goals
    Set {
        /// Daily calorie goal
        calories: f64,
        /// Protein goal (grams)
        #[arg(long)]
        protein: Option<f64>,
        /// Carbs goal (grams)
        #[arg(long)]
        carbs: Option<f64>,
        /// Fat goal (grams)
        #[arg(long)]
        fat: Option<f64>,
        /// Water goal (millilitres)
        #[arg(long, default_value = "2000")]
        water: u32,
        /// Target weight (kg)
        #[arg(long)]
        weight: Option<f64>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show current goals
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Clear goals
    Clear {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum FeedCommands {
    /// Show recent posts
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Share a post
    Post {
        /// Post body
        body: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Like (or unlike) a post
    Like {
        /// Post ID
        post_id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Comment on a post
    Comment {
        /// Post ID
        post_id: String,
        /// Comment body
        body: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum SyncCommands {
    /// Run a single sync attempt
    Now {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Check server reachability
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Sync continuously on an interval
    Watch {
        /// Seconds between sync attempts
        #[arg(short, long, default_value_t = DEFAULT_SYNC_INTERVAL_SECS)]
        interval: u64,
    },
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("nosh=warn")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    // Commands run on this thread; the runtime backs the HTTP clients and
    // the server. Entering it makes Handle::current() work everywhere.
    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: failed to start async runtime: {e}");
            process::exit(1);
        }
    };
    let _guard = rt.enter();

    if let Err(e) = run(&rt, cli) {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

/// Build a client for the configured server, or explain how to configure one.
fn remote_client(config: &Config) -> Result<RemoteClient> {
    let url = config
        .settings
        .server_url
        .as_deref()
        .context("No server configured. Run `nosh connect <url>` first")?;
    let api_key = config.load_api_key()?;
    Ok(RemoteClient::new(url, api_key))
}

fn run(rt: &tokio::runtime::Runtime, cli: Cli) -> Result<()> {
    let mut config = Config::load()?;

    match cli.command {
        Commands::Serve {
            port,
            bind,
            no_auth,
        } => {
            let api_key = if no_auth {
                None
            } else {
                let (key, _new) = config.load_or_create_api_key()?;
                Some(key)
            };
            let storage = Storage::open(&config.db_path)?;
            return rt.block_on(server::start_server(storage, port, &bind, api_key));
        }
        Commands::Connect { url, key, author } => {
            config.settings.server_url = Some(url.trim_end_matches('/').to_string());
            if author.is_some() {
                config.settings.author = author;
            }
            config.save_settings()?;
            if let Some(key) = key {
                config.save_api_key(&key)?;
            }
            let url = config.settings.server_url.as_deref().unwrap_or_default();
            println!("Connected to {url}");
            return Ok(());
        }
        command => dispatch(rt, &config, command),
    }
}

#[allow(clippy::too_many_lines)]
fn dispatch(rt: &tokio::runtime::Runtime, config: &Config, command: Commands) -> Result<()> {
    let mut svc = NoshService::open(&config.db_path)?;

    match command {
        Commands::Serve { .. } | Commands::Connect { .. } => unreachable!("handled in run"),
        Commands::Log {
            food,
            meal,
            quantity,
            date,
            json,
        } => {
            let off = OpenFoodFactsClient::new();
            cmd_log(&mut svc, &off, &food, &meal, &quantity, date, json)
        }
        Commands::Delete { entry_id, json } => cmd_delete(&mut svc, &entry_id, json),
        Commands::Clear { date, json } => cmd_clear(&mut svc, date, json),
        Commands::Summary { date, json } => cmd_summary(&svc, date, json),
        Commands::History { days, json } => cmd_history(&svc, days, json),
        Commands::Water { command } => match command {
            WaterCommands::Add { ml, date, json } => cmd_water_add(&mut svc, ml, date, json),
            WaterCommands::Set { ml, date, json } => cmd_water_set(&mut svc, ml, date, json),
        },
        Commands::Mood {
            rating,
            note,
            date,
            json,
        } => cmd_mood(&mut svc, rating, note, date, json),
        Commands::Weight { command } => match command {
            WeightCommands::Log {
                value,
                unit,
                date,
                json,
            } => cmd_weight_log(&mut svc, value, &unit, date, json),
            WeightCommands::Show { date, json } => cmd_weight_show(&svc, date, json),
            WeightCommands::History { limit, json } => cmd_weight_history(&svc, limit, json),
        },
        Commands::Food { command } => match command {
            FoodCommands::Add {
                name,
                calories,
                protein,
                carbs,
                fat,
                serving,
                category,
                brand,
                json,
            } => cmd_food_add(
                &mut svc, &name, calories, protein, carbs, fat, &serving, &category, brand, json,
            ),
            FoodCommands::List { json } => cmd_food_list(&svc, json),
        },
        Commands::Search { query, json } => {
            let off = OpenFoodFactsClient::new();
            cmd_search(&svc, &off, &query, json)
        }
        Commands::Goal { command } => match command {
            GoalCommands::Set {
                calories,
                protein,
                carbs,
                fat,
                water,
                weight,
                json,
            } => cmd_goal_set(&mut svc, calories, protein, carbs, fat, water, weight, json),
            GoalCommands::Show { json } => cmd_goal_show(&svc, json),
            GoalCommands::Clear { json } => cmd_goal_clear(&mut svc, json),
        },
        Commands::Feed { command } => {
            let client = remote_client(config)?;
            let author = config.author();
            match command {
                FeedCommands::List { json } => rt.block_on(cmd_feed_list(&client, json)),
                FeedCommands::Post { body, json } => {
                    rt.block_on(cmd_feed_post(&client, &author, &body, json))
                }
                FeedCommands::Like { post_id, json } => {
                    rt.block_on(cmd_feed_like(&client, &post_id, &author, json))
                }
                FeedCommands::Comment {
                    post_id,
                    body,
                    json,
                } => rt.block_on(cmd_feed_comment(&client, &post_id, &author, &body, json)),
            }
        }
        Commands::Sync { command } => {
            let client = remote_client(config)?;
            match command {
                SyncCommands::Now { json } => cmd_sync_now(&mut svc, &client, json),
                SyncCommands::Status { json } => {
                    let url = config.settings.server_url.as_deref().unwrap_or_default();
                    cmd_sync_status(&client, url, json)
                }
                SyncCommands::Watch { interval } => cmd_sync_watch(&mut svc, &client, interval),
            }
        }
    }
}
