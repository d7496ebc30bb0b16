mod display;

use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use pollfinder_core::{
    AddressSorter, ElectionsSummary, GeocodeResult, Point, Postcode, Settings, Territory,
};
use pollfinder_geocode::{GeocodeChain, GeocodeError, GeocodeMode, MapitClient};
use pollfinder_remote::{DirectionsProvider, ElectionsClient};
use pollfinder_routing::{Endpoint, RoutingHelper, RoutingOutcome};
use pollfinder_store::{LookupStore, MemoryStore};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

const EXIT_NOT_FOUND: u8 = 2;
const EXIT_MULTIPLE_COUNCILS: u8 = 3;
const EXIT_RATE_LIMITED: u8 = 4;

#[derive(Parser, Debug)]
#[command(name = "pollfinder", version, about = "Find your polling station from a postcode")]
struct Cli {
    /// JSON fixture document to serve lookups from
    #[arg(long, global = true, conflicts_with = "db")]
    fixtures: Option<PathBuf>,
    /// DuckDB database with imported lookup tables
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    /// Log filter used when RUST_LOG is unset (e.g. "info", "pollfinder_geocode=debug")
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,
    /// Output machine-readable JSON
    #[arg(long, global = true)]
    json: bool,
    /// JSON settings file; flags and environment variables override it
    #[arg(long, global = true, env = "POLLFINDER_CONFIG")]
    config: Option<PathBuf>,
    #[command(flatten)]
    settings: SettingsArgs,
    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct SettingsArgs {
    /// MapIt base URL
    #[arg(long, global = true, env = "MAPIT_URL")]
    mapit_url: Option<String>,
    /// User-Agent sent to MapIt
    #[arg(long, global = true, env = "MAPIT_UA")]
    mapit_ua: Option<String>,
    /// Every Election base URL
    #[arg(long, global = true, env = "EE_BASE")]
    ee_base: Option<String>,
    /// User-Agent sent to Every Election
    #[arg(long, global = true, env = "CUSTOM_UA")]
    custom_ua: Option<String>,
    /// Google Directions URL up to and including `origin=`
    #[arg(long, global = true, env = "BASE_GOOGLE_URL")]
    google_url: Option<String>,
    /// OpenRouteService URL template
    #[arg(long, global = true, env = "ORS_ROUTE_URL_TEMPLATE")]
    ors_url_template: Option<String>,
    /// Try OpenRouteService when Google fails
    #[arg(long, global = true, env = "ORS_FALLBACK")]
    ors_fallback: bool,
    /// Locale for walk time and distance labels ("en" or "cy")
    #[arg(long, global = true, env = "POLLFINDER_LOCALE")]
    locale: Option<String>,
    /// Postcode used by `lookup` when none is given
    #[arg(long, global = true, env = "EXAMPLE_POSTCODE")]
    example_postcode: Option<String>,
    /// Skip the pause between geocoding sources
    #[arg(long, global = true)]
    no_backoff: bool,
}

impl SettingsArgs {
    fn into_settings(self, mut settings: Settings) -> Settings {
        if let Some(url) = self.mapit_url {
            settings.mapit_url = url;
        }
        if self.mapit_ua.is_some() {
            settings.mapit_user_agent = self.mapit_ua;
        }
        if let Some(url) = self.ee_base {
            settings.ee_base_url = url;
        }
        if self.custom_ua.is_some() {
            settings.custom_user_agent = self.custom_ua;
        }
        if let Some(url) = self.google_url {
            settings.google_directions_url = url;
        }
        if let Some(template) = self.ors_url_template {
            settings.ors_route_url_template = template;
        }
        if self.ors_fallback {
            settings.ors_fallback = true;
        }
        if let Some(locale) = self.locale {
            settings.locale = locale;
        }
        if let Some(postcode) = self.example_postcode {
            settings.example_postcode = postcode;
        }
        if self.no_backoff {
            settings.geocode_backoff = None;
        }
        settings
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Full search: territory, routing, geocode and upcoming elections
    Lookup {
        /// Postcode to search for (defaults to the example postcode)
        postcode: Option<String>,
    },
    /// Geocode a postcode through AddressBase with MapIt fallback
    Geocode {
        postcode: String,
        /// Return the centroid only, without council or codes
        #[arg(long)]
        point_only: bool,
    },
    /// Decide which page a postcode search lands on
    Route { postcode: String },
    /// Sort addresses street-first (reads stdin when none are given)
    Sort { addresses: Vec<String> },
    /// Upcoming elections for a postcode
    Elections { postcode: String },
    /// Walking directions from a postcode to a point
    Directions {
        postcode: String,
        /// Destination longitude
        #[arg(long, allow_negative_numbers = true)]
        lon: f64,
        /// Destination latitude
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,
    },
    /// Import the lookup tables from CSV files into the --db database
    Import {
        /// Directory holding addresses.csv, onsad.csv,
        /// residential_addresses.csv and blacklist.csv
        data_dir: PathBuf,
    },
}

/// Everything `lookup` found for one postcode.
#[derive(Debug, Serialize)]
struct LookupReport {
    postcode: String,
    territory: Territory,
    outcome: RoutingOutcome,
    endpoint: Endpoint,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    addresses: Vec<String>,
    geocode: Option<GeocodeResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    geocode_error: Option<String>,
    elections: ElectionsSummary,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level)?;
    info!("pollfinder v{}", env!("CARGO_PKG_VERSION"));

    let settings = cli.settings.into_settings(load_settings(cli.config.as_deref())?);
    let json = cli.json;
    let (fixtures, db) = (cli.fixtures.as_deref(), cli.db.as_deref());

    match cli.command {
        Command::Lookup { postcode } => {
            let raw = match postcode {
                Some(p) => p,
                None => {
                    let example = settings.example_postcode();
                    eprintln!("Using example postcode {} ({})", example.display(), example.url());
                    example.display().to_string()
                }
            };
            let postcode = Postcode::parse(&raw)?;
            let store = open_store(fixtures, db)?;
            lookup(&postcode, &*store, &settings, json).await
        }
        Command::Geocode {
            postcode,
            point_only,
        } => {
            let postcode = Postcode::parse(&postcode)?;
            let mode = if point_only {
                GeocodeMode::PointOnly
            } else {
                GeocodeMode::Full
            };
            let store = open_store(fixtures, db)?;
            geocode(&postcode, mode, &*store, &settings, json).await
        }
        Command::Route { postcode } => {
            let postcode = Postcode::parse(&postcode)?;
            let store = open_store(fixtures, db)?;
            route(&postcode, &*store, json)
        }
        Command::Sort { addresses } => {
            let addresses = if addresses.is_empty() {
                read_lines()?
            } else {
                addresses
            };
            let sorted = AddressSorter::new(addresses).natural_sort();
            display::print_output(json, &sorted, |s| display::print_addresses(s))?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Elections { postcode } => {
            let postcode = Postcode::parse(&postcode)?;
            let client = ElectionsClient::new(&settings).context("building elections client")?;
            let summary = client.summary(postcode.as_str()).await;
            display::print_output(json, &summary, display::print_elections)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Directions { postcode, lon, lat } => {
            let postcode = Postcode::parse(&postcode)?;
            let store = open_store(fixtures, db)?;
            directions(&postcode, Point::new(lon, lat), &*store, &settings, json).await
        }
        Command::Import { data_dir } => {
            let Some(db) = db else {
                bail!("import needs --db <path> to write to");
            };
            import(db, &data_dir)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

// ── Subcommands ──

async fn geocode<S: LookupStore + ?Sized>(
    postcode: &Postcode,
    mode: GeocodeMode,
    store: &S,
    settings: &Settings,
    json: bool,
) -> anyhow::Result<ExitCode> {
    let mapit = MapitClient::new(settings).context("building mapit client")?;
    let chain = GeocodeChain::new(store, &mapit).with_backoff(settings.geocode_backoff);
    match chain.run(postcode.as_str(), mode).await {
        Ok(result) => {
            display::print_output(json, &result, display::print_geocode)?;
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => geocode_failure(postcode, e),
    }
}

fn route<S: LookupStore + ?Sized>(
    postcode: &Postcode,
    store: &S,
    json: bool,
) -> anyhow::Result<ExitCode> {
    let helper =
        RoutingHelper::new(postcode.as_str(), store, store).context("reading routing data")?;
    let outcome = helper.outcome();
    display::print_output(json, &outcome, |o| {
        display::print_route(o, &helper.sorted_addresses())
    })?;
    Ok(ExitCode::SUCCESS)
}

async fn directions<S: LookupStore + ?Sized>(
    postcode: &Postcode,
    destination: Point,
    store: &S,
    settings: &Settings,
    json: bool,
) -> anyhow::Result<ExitCode> {
    let mapit = MapitClient::new(settings).context("building mapit client")?;
    let chain = GeocodeChain::new(store, &mapit).with_backoff(settings.geocode_backoff);
    let start = match chain.geocode_point_only(postcode.as_str()).await {
        Ok(result) => result.point,
        Err(e) => return geocode_failure(postcode, e),
    };
    let provider = DirectionsProvider::new(settings).context("building directions client")?;
    match provider.get_directions(start, destination).await {
        Some(directions) => {
            display::print_output(json, &directions, display::print_directions)?;
            Ok(ExitCode::SUCCESS)
        }
        None => {
            eprintln!("No walking directions available from {postcode}");
            Ok(ExitCode::from(EXIT_NOT_FOUND))
        }
    }
}

async fn lookup<S: LookupStore + ?Sized>(
    postcode: &Postcode,
    store: &S,
    settings: &Settings,
    json: bool,
) -> anyhow::Result<ExitCode> {
    let helper =
        RoutingHelper::new(postcode.as_str(), store, store).context("reading routing data")?;
    let outcome = helper.outcome();

    let mapit = MapitClient::new(settings).context("building mapit client")?;
    let chain = GeocodeChain::new(store, &mapit).with_backoff(settings.geocode_backoff);
    let elections = ElectionsClient::new(settings).context("building elections client")?;

    let (geocoded, summary) = tokio::join!(
        chain.geocode(postcode.as_str()),
        elections.summary(postcode.as_str())
    );

    let mut exit = ExitCode::SUCCESS;
    let (geocode, geocode_error) = match geocoded {
        Ok(result) => (Some(result), None),
        Err(e) => {
            exit = ExitCode::from(exit_code_for(&e));
            (None, Some(e.to_string()))
        }
    };

    let addresses = match outcome {
        RoutingOutcome::MultipleAddresses { .. } => helper
            .sorted_addresses()
            .into_iter()
            .map(|a| a.address.clone())
            .collect(),
        _ => Vec::new(),
    };

    let report = LookupReport {
        postcode: postcode.spaced(),
        territory: postcode.territory(),
        endpoint: outcome.endpoint(),
        outcome,
        addresses,
        geocode,
        geocode_error,
        elections: summary,
    };
    display::print_output(json, &report, display::print_lookup)?;
    Ok(exit)
}

fn exit_code_for(err: &GeocodeError) -> u8 {
    match err {
        GeocodeError::MultipleCouncils { .. } => EXIT_MULTIPLE_COUNCILS,
        GeocodeError::RateLimited => EXIT_RATE_LIMITED,
        _ => EXIT_NOT_FOUND,
    }
}

/// Print the page-level message for a failed geocode and pick the exit code.
fn geocode_failure(postcode: &Postcode, err: GeocodeError) -> anyhow::Result<ExitCode> {
    match &err {
        GeocodeError::MultipleCouncils { .. } => {
            eprintln!(
                "{postcode} covers more than one council area; \
                 contact your council to find your polling station"
            );
        }
        GeocodeError::Exhausted { .. } => {
            eprintln!("Could not find {postcode}; please check it and try again");
        }
        GeocodeError::RateLimited => {
            eprintln!("The postcode lookup service is busy; please try again later");
        }
        _ => eprintln!("{err}"),
    }
    Ok(ExitCode::from(exit_code_for(&err)))
}

fn init_tracing(log_level: &str) -> anyhow::Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(log_level)
            .with_context(|| format!("invalid log level/filter '{log_level}'"))?,
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .try_init()
        .map_err(|e| anyhow::anyhow!(e))
}

fn read_lines() -> anyhow::Result<Vec<String>> {
    let stdin = std::io::stdin();
    let mut lines = Vec::new();
    for line in stdin.lock().lines() {
        let line = line.context("reading addresses from stdin")?;
        if !line.trim().is_empty() {
            lines.push(line);
        }
    }
    Ok(lines)
}

// ── Store selection ──

/// Settings from the `--config` file, or the defaults when none is given.
fn load_settings(path: Option<&Path>) -> anyhow::Result<Settings> {
    let Some(path) = path else {
        return Ok(Settings::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let settings = serde_json::from_str(&text)
        .with_context(|| format!("parsing config {}", path.display()))?;
    info!(path = %path.display(), "loaded settings");
    Ok(settings)
}

fn open_store(fixtures: Option<&Path>, db: Option<&Path>) -> anyhow::Result<Box<dyn LookupStore>> {
    if let Some(path) = fixtures {
        let store = MemoryStore::load_json(path)
            .with_context(|| format!("loading fixtures from {}", path.display()))?;
        return Ok(Box::new(store));
    }
    if let Some(path) = db {
        return open_db(path);
    }
    info!("no --fixtures or --db given, every postcode goes to MapIt");
    Ok(Box::new(MemoryStore::new()))
}

#[cfg(feature = "duckdb")]
fn open_db(path: &Path) -> anyhow::Result<Box<dyn LookupStore>> {
    let store = pollfinder_store::DuckStore::open_persistent(path)
        .with_context(|| format!("opening {}", path.display()))?;
    if !store.has_tables() {
        bail!(
            "{} has no lookup tables; run `pollfinder import --db {} <data-dir>` first",
            path.display(),
            path.display()
        );
    }
    Ok(Box::new(store))
}

#[cfg(not(feature = "duckdb"))]
fn open_db(_path: &Path) -> anyhow::Result<Box<dyn LookupStore>> {
    bail!("pollfinder was built without DuckDB support; use --fixtures instead")
}

#[cfg(feature = "duckdb")]
fn import(db: &Path, data_dir: &Path) -> anyhow::Result<()> {
    let store = pollfinder_store::DuckStore::open_persistent(db)
        .with_context(|| format!("opening {}", db.display()))?;
    store
        .load_all(data_dir)
        .with_context(|| format!("importing CSV files from {}", data_dir.display()))?;
    for table in ["addresses", "onsad", "residential_addresses", "blacklist"] {
        let count = store.count_table(table)?;
        eprintln!("  {table:<24} {count} rows");
    }
    Ok(())
}

#[cfg(not(feature = "duckdb"))]
fn import(_db: &Path, _data_dir: &Path) -> anyhow::Result<()> {
    bail!("pollfinder was built without DuckDB support")
}
