use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result, bail};
use clap::{Args, Parser, Subcommand};
use nomnom_core::time::{now_unix_secs, unix_to_date};
use nomnom_core::{
    Action, Context, EngineConfig, Interaction, MealEvent, MealTime, ProfileSummary,
    Recommendation, Recommender, Review, Weekday,
};
use nomnom_store::{Store, config_path, default_base_dir, load_config};

#[derive(Parser)]
#[command(name = "nomnom", about = "Contextual restaurant recommendations")]
struct Cli {
    /// Data directory (default: $NOMNOM_DATA_DIR or ~/.nomnom)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Engine config file (default: <data-dir>/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose debug output
    #[arg(long, global = true)]
    verbose: bool,

    /// Print machine-readable JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Recommend restaurants for a user
    Recommend(RequestArgs),

    /// Recommend with the path taken and per-item score breakdown
    Explain(RequestArgs),

    /// Show a user's meal totals, average rating and recent meals
    Profile {
        user: String,

        /// Number of recent meals to list
        #[arg(long, default_value_t = 5)]
        recent: usize,
    },

    /// Record a meal
    LogMeal {
        user: String,
        restaurant: String,

        /// Date of the meal, YYYY-MM-DD (default: today)
        #[arg(long)]
        date: Option<String>,

        /// Meal time (default: the current one)
        #[arg(long, value_parser = parse_meal_time)]
        meal: Option<MealTime>,
    },

    /// Rate a restaurant from 1 to 5; replaces an earlier rating
    Review {
        user: String,
        restaurant: String,

        #[arg(value_parser = clap::value_parser!(u8).range(1..=5))]
        rating: u8,

        /// Whether the price felt fair
        #[arg(long)]
        price_ok: Option<bool>,

        /// Visits per month
        #[arg(long)]
        visits: Option<u32>,

        /// Review date, YYYY-MM-DD (default: today)
        #[arg(long)]
        date: Option<String>,
    },

    /// Record a response to a recommendation (eat, decline, favorite)
    Interact {
        user: String,
        restaurant: String,

        #[arg(value_parser = parse_action)]
        action: Action,

        /// 1-based position in the list that was shown
        #[arg(long)]
        rank: Option<u32>,
    },

    /// Replace all data with a JSON dataset
    Import { path: PathBuf },

    /// Write all data to a JSON dataset
    Export { path: PathBuf },

    /// Show row counts
    Stats,
}

#[derive(Args)]
struct RequestArgs {
    user: String,

    /// Day of week (default: today)
    #[arg(long, value_parser = parse_weekday)]
    day: Option<Weekday>,

    /// Local hour as a decimal, e.g. 12.5 for 12:30
    #[arg(long, value_parser = parse_hour, conflicts_with = "meal")]
    hour: Option<f64>,

    /// Meal time, e.g. "lunch" or "tea time"
    #[arg(long, value_parser = parse_meal_time)]
    meal: Option<MealTime>,

    /// Restaurant ids to leave out, comma separated
    #[arg(long, value_delimiter = ',')]
    exclude: Vec<String>,
}

fn parse_weekday(s: &str) -> std::result::Result<Weekday, String> {
    Weekday::parse(s).ok_or_else(|| format!("unknown day: {s}"))
}

fn parse_meal_time(s: &str) -> std::result::Result<MealTime, String> {
    MealTime::parse(s).ok_or_else(|| format!("unknown meal time: {s}"))
}

fn parse_action(s: &str) -> std::result::Result<Action, String> {
    Action::parse(s).ok_or_else(|| format!("unknown action: {s} (expected eat, decline or favorite)"))
}

fn parse_hour(s: &str) -> std::result::Result<f64, String> {
    let hour: f64 = s.parse().map_err(|_| format!("not a number: {s}"))?;
    if (0.0..24.0).contains(&hour) {
        Ok(hour)
    } else {
        Err(format!("hour must be in [0, 24), got {hour}"))
    }
}

fn base_dir(cli: &Cli) -> PathBuf {
    cli.data_dir.clone().unwrap_or_else(default_base_dir)
}

fn open_store(cli: &Cli) -> Result<Store> {
    let dir = base_dir(cli);
    Store::open_in(&dir).with_context(|| format!("failed to open store in {}", dir.display()))
}

fn load_engine_config(cli: &Cli) -> Result<EngineConfig> {
    let path = cli
        .config
        .clone()
        .unwrap_or_else(|| config_path(&base_dir(cli)));
    load_config(&path).with_context(|| format!("failed to load config {}", path.display()))
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Commands::Recommend(args) => cmd_recommend(&cli, args),
        Commands::Explain(args) => cmd_explain(&cli, args),
        Commands::Profile { user, recent } => cmd_profile(&cli, user, *recent),
        Commands::LogMeal {
            user,
            restaurant,
            date,
            meal,
        } => cmd_log_meal(&cli, user, restaurant, date.as_deref(), *meal),
        Commands::Review {
            user,
            restaurant,
            rating,
            price_ok,
            visits,
            date,
        } => cmd_review(
            &cli,
            Review {
                id: String::new(),
                user_id: user.clone(),
                restaurant_id: restaurant.clone(),
                date: String::new(),
                rating: *rating,
                price_satisfaction: *price_ok,
                visit_frequency: *visits,
            },
            date.as_deref(),
        ),
        Commands::Interact {
            user,
            restaurant,
            action,
            rank,
        } => cmd_interact(&cli, user, restaurant, *action, *rank),
        Commands::Import { path } => cmd_import(&cli, path),
        Commands::Export { path } => cmd_export(&cli, path),
        Commands::Stats => cmd_stats(&cli),
    }
}

/// Explicit day, hour or meal time pin the context; anything left out is
/// taken from the local clock. `None` lets the engine read the clock itself.
fn request_context(args: &RequestArgs, utc_offset_minutes: i32) -> Option<Context> {
    if args.day.is_none() && args.hour.is_none() && args.meal.is_none() {
        return None;
    }
    let now = Context::now(utc_offset_minutes);
    let day = args.day.unwrap_or(now.day);
    Some(match (args.meal, args.hour) {
        (Some(meal), _) => Context::for_meal(day, meal),
        (None, Some(hour)) => Context::new(day, hour),
        (None, None) => Context::new(day, now.hour),
    })
}

fn today(config: &EngineConfig) -> String {
    unix_to_date(now_unix_secs(), config.utc_offset_minutes)
}

fn ensure_user(store: &Store, user: &str) -> Result<()> {
    if store
        .load_user(user)
        .context("failed to look up user")?
        .is_none()
    {
        bail!("unknown user: {user}");
    }
    Ok(())
}

fn cmd_recommend(cli: &Cli, args: &RequestArgs) -> Result<()> {
    let config = load_engine_config(cli)?;
    let store = open_store(cli)?;
    ensure_user(&store, &args.user)?;

    let context = request_context(args, config.utc_offset_minutes);
    let engine = Recommender::new(config);
    let ids = engine.recommend(&store, &args.user, &args.exclude, context);

    if cli.json {
        println!("{}", serde_json::to_string(&ids)?);
    } else if ids.is_empty() {
        println!("(no open restaurants to recommend)");
    } else {
        for id in &ids {
            println!("{id}");
        }
    }
    Ok(())
}

fn cmd_explain(cli: &Cli, args: &RequestArgs) -> Result<()> {
    let config = load_engine_config(cli)?;
    let store = open_store(cli)?;

    let context = request_context(args, config.utc_offset_minutes);
    let engine = Recommender::new(config);
    let rec = engine
        .explain(&store, &args.user, &args.exclude, context)
        .context("recommendation failed")?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&rec)?);
    } else {
        print_explanation(&rec);
    }
    Ok(())
}

fn print_explanation(rec: &Recommendation) {
    println!("user:      {}", rec.user_id);
    println!("context:   {}", rec.context);
    println!("path:      {}", rec.path);
    println!("activity:  {}", rec.activity);
    println!(
        "habit:     {}",
        rec.predicted_tag.as_deref().unwrap_or("(none)")
    );
    let w = &rec.weights;
    println!(
        "weights:   distance={:.2} price={:.2} tag={:.2} popularity={:.2} pattern={:.2}",
        w.distance, w.price, w.tag, w.popularity, w.pattern
    );

    if rec.items.is_empty() {
        println!("(no open restaurants to recommend)");
        return;
    }
    println!();
    for (rank, item) in rec.items.iter().enumerate() {
        let s = &item.score;
        let km = if s.distance_km.is_finite() {
            format!("{:.1}km", s.distance_km)
        } else {
            "?".to_string()
        };
        println!(
            "{:>2}. {:<12} {:<28} total={:.3} dist={:.3} ({km}) price={:.3} tag={:.3} pop={:.3} habit={:.3}{}",
            rank + 1,
            item.restaurant_id,
            item.name,
            s.total,
            s.distance,
            s.price,
            s.tag,
            s.popularity,
            s.pattern,
            if s.revisited { " revisit" } else { "" },
        );
    }
}

fn cmd_profile(cli: &Cli, user_id: &str, recent: usize) -> Result<()> {
    let config = load_engine_config(cli)?;
    let store = open_store(cli)?;
    let snapshot = store
        .load_snapshot_for(user_id)
        .context("failed to load data")?;
    let Some(user) = snapshot.user(user_id) else {
        bail!("unknown user: {user_id}");
    };
    let summary = ProfileSummary::build(user, &snapshot, &config.profile, recent);

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }
    let or_na = |s: Option<String>| s.unwrap_or_else(|| "n/a".to_string());
    println!("user:       {}", summary.user_id);
    println!("name:       {}", or_na(summary.name.clone()));
    println!("location:   {}", or_na(summary.location.clone()));
    println!("meals:      {}", summary.total_meals);
    println!(
        "avg rating: {}",
        or_na(summary.average_rating.map(|r| format!("{r:.1}")))
    );
    println!("favourite:  {}", or_na(summary.favourite_cuisine.clone()));
    println!(
        "usually:    {}",
        match (summary.usual_day, summary.usual_meal_time) {
            (Some(day), Some(meal)) => format!("{meal} on {day}"),
            _ => "n/a".to_string(),
        }
    );

    if summary.recent_meals.is_empty() {
        println!("(no meals recorded)");
        return Ok(());
    }
    println!();
    for meal in &summary.recent_meals {
        let rating = meal
            .rating
            .map_or_else(|| "unrated".to_string(), |r| format!("{r}/5"));
        println!(
            "{} {:<10} {:<28} {rating}",
            meal.date,
            meal.meal_time.name(),
            meal.restaurant_name
        );
    }
    Ok(())
}

fn cmd_log_meal(
    cli: &Cli,
    user: &str,
    restaurant: &str,
    date: Option<&str>,
    meal: Option<MealTime>,
) -> Result<()> {
    let config = load_engine_config(cli)?;
    let store = open_store(cli)?;

    let date = date.map_or_else(|| today(&config), str::to_string);
    let Some(day) = Weekday::from_date(&date) else {
        bail!("invalid date: {date} (expected YYYY-MM-DD)");
    };
    let meal_time = meal.unwrap_or_else(|| Context::now(config.utc_offset_minutes).meal_time);

    let id = store
        .record_meal(&MealEvent {
            id: String::new(),
            user_id: user.to_string(),
            restaurant_id: restaurant.to_string(),
            date: date.clone(),
            day,
            meal_time,
        })
        .context("failed to record meal")?;

    println!("logged meal {id}: {user} at {restaurant}, {} {date}", meal_time.name());
    Ok(())
}

fn cmd_review(cli: &Cli, review: Review, date: Option<&str>) -> Result<()> {
    let config = load_engine_config(cli)?;
    let store = open_store(cli)?;

    let date = date.map_or_else(|| today(&config), str::to_string);
    if Weekday::from_date(&date).is_none() {
        bail!("invalid date: {date} (expected YYYY-MM-DD)");
    }
    let review = Review { date, ..review };
    let id = store
        .record_review(&review)
        .context("failed to record review")?;

    println!(
        "review {id}: {} rated {} {}/5",
        review.user_id, review.restaurant_id, review.rating
    );
    Ok(())
}

fn cmd_interact(
    cli: &Cli,
    user: &str,
    restaurant: &str,
    action: Action,
    rank: Option<u32>,
) -> Result<()> {
    let store = open_store(cli)?;
    let id = store
        .record_interaction(&Interaction {
            id: String::new(),
            user_id: user.to_string(),
            restaurant_id: restaurant.to_string(),
            action,
            timestamp: now_unix_secs(),
            recommendation_rank: rank,
        })
        .context("failed to record interaction")?;

    println!("interaction {id}: {user} {action} {restaurant}");
    Ok(())
}

fn cmd_import(cli: &Cli, path: &Path) -> Result<()> {
    let store = open_store(cli)?;
    let summary = store
        .import_json_file(path)
        .context("failed to import JSON")?;

    if cli.json {
        println!("{}", serde_json::to_string(&summary)?);
    } else {
        println!(
            "imported from {}. users={}, restaurants={}, meals={}, reviews={}, interactions={}, skipped={}",
            path.display(),
            summary.users,
            summary.restaurants,
            summary.meals,
            summary.reviews,
            summary.interactions,
            summary.skipped,
        );
    }
    Ok(())
}

fn cmd_export(cli: &Cli, path: &Path) -> Result<()> {
    let store = open_store(cli)?;
    store
        .export_json_file(path)
        .context("failed to export JSON")?;
    println!("exported to {}", path.display());
    Ok(())
}

fn cmd_stats(cli: &Cli) -> Result<()> {
    let store = open_store(cli)?;
    let stats = store.stats().context("failed to read stats")?;

    if cli.json {
        println!("{}", serde_json::to_string(&stats)?);
        return Ok(());
    }
    println!("users:        {}", stats.users);
    println!("restaurants:  {}", stats.restaurants);
    println!("meals:        {}", stats.meals);
    println!("reviews:      {}", stats.reviews);
    println!("interactions: {}", stats.interactions);
    println!("generation:   {}", stats.generation);
    Ok(())
}
