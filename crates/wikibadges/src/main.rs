use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{ArgAction, Args, Parser, Subcommand};
use log::info;
use similar::TextDiff;
use wikibadges_core::amender::{AmendError, OtherProjectsSidebarAmender};
use wikibadges_core::config::{
    BadgesConfig, DEFAULT_CONFIG_PATH, load_config, parse_property_setting, patch_sidebar_config,
};
use wikibadges_core::hooks::HookRegistry;
use wikibadges_core::ids::{EntityId, PropertyId};
use wikibadges_core::lookup::{ApiEntityLookup, EntityLookup, InMemoryEntityLookup};
use wikibadges_core::sidebar::Sidebar;

#[derive(Debug, Parser)]
#[command(
    name = "wikibadges",
    version,
    about = "Amend other-projects sidebars with Commons category links"
)]
struct Cli {
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    #[arg(
        long,
        global = true,
        value_name = "PID",
        help = "Override the commons category property (empty or `none` disables)"
    )]
    property: Option<String>,
    #[arg(short, long, global = true, action = ArgAction::Count, help = "Increase log verbosity")]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Print a sidebar JSON file with the Commons link applied")]
    Amend(AmendArgs),
    #[command(about = "Print the Commons category link for an entity")]
    Link(LinkArgs),
    Config(ConfigArgs),
}

#[derive(Debug, Args)]
struct SourceArgs {
    #[arg(
        long,
        value_name = "PATH",
        conflicts_with = "api",
        help = "Read entities from a wbgetentities response or JSON array"
    )]
    entities: Option<PathBuf>,
    #[arg(long, help = "Fetch entities from the configured Wikibase API")]
    api: bool,
}

#[derive(Debug, Args)]
struct AmendArgs {
    #[arg(long, value_name = "ID")]
    entity: String,
    #[arg(long, value_name = "PATH", help = "Sidebar JSON; empty sidebar when omitted")]
    sidebar: Option<PathBuf>,
    #[arg(long, help = "Print a unified diff instead of the amended sidebar")]
    diff: bool,
    #[command(flatten)]
    source: SourceArgs,
}

#[derive(Debug, Args)]
struct LinkArgs {
    #[arg(long, value_name = "ID")]
    entity: String,
    #[command(flatten)]
    source: SourceArgs,
}

#[derive(Debug, Args)]
struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigSubcommand,
}

#[derive(Debug, Subcommand)]
enum ConfigSubcommand {
    Show,
    #[command(name = "set-property")]
    SetProperty {
        #[arg(value_name = "PID|none")]
        value: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();
    init_logging(cli.verbose);

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

    match cli.command {
        Commands::Amend(args) => run_amend(&config_path, cli.property.as_deref(), args),
        Commands::Link(args) => run_link(&config_path, cli.property.as_deref(), args),
        Commands::Config(args) => match args.command {
            ConfigSubcommand::Show => run_config_show(&config_path, cli.property.as_deref()),
            ConfigSubcommand::SetProperty { value } => run_config_set_property(&config_path, &value),
        },
    }
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();
}

fn run_amend(config_path: &Path, property: Option<&str>, args: AmendArgs) -> Result<()> {
    let config = load_config(config_path)?;
    let entity_id = parse_entity(&args.entity)?;
    let lookup = open_lookup(&config, &args.source)?;
    let amender = build_amender(lookup, &config, property)?;

    let original = match &args.sidebar {
        Some(path) => {
            let content = fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            serde_json::from_str::<Sidebar>(&content)
                .with_context(|| format!("failed to parse sidebar {}", path.display()))?
        }
        None => Sidebar::new(),
    };

    let mut registry = HookRegistry::new();
    registry.register(amender);
    let mut sidebar = original.clone();
    registry.run_other_projects_sidebar(&entity_id, &mut sidebar);

    let after = serde_json::to_string_pretty(&sidebar)?;
    if args.diff {
        let before = serde_json::to_string_pretty(&original)?;
        if before == after {
            println!("sidebar unchanged");
        } else {
            let diff = TextDiff::from_lines(before.as_str(), after.as_str());
            print!(
                "{}",
                diff.unified_diff()
                    .context_radius(3)
                    .header("sidebar", "sidebar (amended)")
            );
        }
    } else {
        println!("{after}");
    }
    Ok(())
}

fn run_link(config_path: &Path, property: Option<&str>, args: LinkArgs) -> Result<()> {
    let config = load_config(config_path)?;
    let entity_id = parse_entity(&args.entity)?;
    let lookup = open_lookup(&config, &args.source)?;
    let amender = build_amender(lookup, &config, property)?;

    let Some(property) = amender.property().cloned() else {
        println!("commons_link: <disabled>");
        return Ok(());
    };
    println!("entity: {entity_id}");
    println!("property: {property}");
    match amender.commons_link(&entity_id) {
        Ok(Some(link)) => println!("commons_link: {}", link.href),
        Ok(None) => println!("commons_link: <none>"),
        Err(AmendError::InvalidValueKind { found, .. }) => {
            println!("commons_link: <invalid value: {found}>");
        }
        Err(error @ AmendError::Lookup(_)) => bail!(error),
    }
    Ok(())
}

fn run_config_show(config_path: &Path, property: Option<&str>) -> Result<()> {
    let config = load_config(config_path)?;
    let resolved = resolve_property(&config, property)?;
    let api = config.api_settings();

    println!("config_path: {}", normalize_path(config_path));
    println!("config_exists: {}", format_flag(config_path.exists()));
    println!(
        "commons_category_property: {}",
        resolved
            .map(|value| value.to_string())
            .unwrap_or_else(|| "<disabled>".to_string())
    );
    println!("api.url: {}", api.url);
    println!("api.user_agent: {}", api.user_agent);
    println!("api.timeout_ms: {}", api.timeout_ms);
    Ok(())
}

fn run_config_set_property(config_path: &Path, value: &str) -> Result<()> {
    let property = if value.trim().is_empty() || value.trim().eq_ignore_ascii_case("none") {
        None
    } else {
        Some(PropertyId::parse(value)?)
    };
    let wrote = patch_sidebar_config(config_path, property.as_ref())?;
    println!("config_path: {}", normalize_path(config_path));
    println!(
        "commons_category_property: {}",
        property
            .map(|value| value.to_string())
            .unwrap_or_else(|| "<disabled>".to_string())
    );
    println!("wrote_config: {}", format_flag(wrote));
    Ok(())
}

fn open_lookup(config: &BadgesConfig, source: &SourceArgs) -> Result<Box<dyn EntityLookup>> {
    if let Some(path) = &source.entities {
        let lookup = InMemoryEntityLookup::load(path)?;
        info!("loaded {} entities from {}", lookup.len(), normalize_path(path));
        return Ok(Box::new(lookup));
    }
    if source.api {
        let lookup = ApiEntityLookup::new(&config.api_settings())?;
        info!("looking up entities via {}", lookup.api_url());
        return Ok(Box::new(lookup));
    }
    bail!("an entity source is required: pass --entities PATH or --api")
}

fn build_amender(
    lookup: Box<dyn EntityLookup>,
    config: &BadgesConfig,
    property: Option<&str>,
) -> Result<OtherProjectsSidebarAmender<Box<dyn EntityLookup>>> {
    let property = resolve_property(config, property)?;
    Ok(OtherProjectsSidebarAmender::new(lookup, property))
}

fn resolve_property(config: &BadgesConfig, property: Option<&str>) -> Result<Option<PropertyId>> {
    let resolved = match property {
        Some(value) if value.trim().eq_ignore_ascii_case("none") => Ok(None),
        Some(value) => parse_property_setting(&toml::Value::String(value.to_string())),
        None => config.commons_category_property(),
    };
    resolved.context("invalid commons category property")
}

fn parse_entity(value: &str) -> Result<EntityId> {
    EntityId::parse(value).with_context(|| format!("invalid --entity value {value:?}"))
}

fn normalize_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

fn format_flag(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}
