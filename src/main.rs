use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use jira_resource::jira::client::JiraClient;
use jira_resource::jira::http::format_jira_error;
use jira_resource::resource::attributes::display_value;
use jira_resource::resource::{builtin_registry, Resolved};
use jira_resource::{Config, Resource, ResourceFactory};
use serde_json::{json, Map, Value};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Navigate JIRA REST resources from the terminal
#[derive(Parser, Debug)]
#[command(name = "jira-resource", version, about, long_about = None)]
struct Args {
    /// JIRA site URL (overrides JIRA_SITE and the config file)
    #[arg(short, long, global = true)]
    site: Option<String>,

    /// Custom config file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json", global = true)]
    output: OutputFormat,

    /// Log level for debugging
    #[arg(long, value_enum, default_value = "off", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List the registered resource types
    Types,

    /// Show one resource, optionally resolving associations
    Show {
        /// Resource type, e.g. Issue or Issuelink
        type_name: String,
        key: String,
        /// Association to resolve (repeatable)
        #[arg(short, long)]
        follow: Vec<String>,
        /// Resolve every association
        #[arg(long, conflicts_with = "follow")]
        all_associations: bool,
    },

    /// List the collection of a resource type
    List { type_name: String },

    /// Delete one resource
    Delete { type_name: String, key: String },

    /// Save the site URL to the config file
    SetSite { url: String },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Yaml,
    /// One row per resource (collections only)
    Table,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

fn setup_logging(level: LogLevel) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let tracing_level = level.to_tracing_level()?;

    let log_path = get_log_path();

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Failed to open log file {:?}: {}", log_path, e);
            return None;
        }
    };

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_max_level(tracing_level)
        .with_writer(non_blocking.with_max_level(tracing_level))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("jira-resource started with log level: {:?}", level);
    tracing::info!("Log file: {:?}", log_path);

    Some(guard)
}

fn get_log_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("jira-resource").join("jira-resource.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".jira-resource").join("jira-resource.log");
    }
    PathBuf::from("jira-resource.log")
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let _log_guard = setup_logging(args.log_level);

    let output = match run(&args).await {
        Ok(output) => output,
        Err(err) => {
            match err.downcast_ref::<jira_resource::Error>() {
                Some(api_err) => eprintln!("Error: {}", format_jira_error(api_err)),
                None => eprintln!("Error: {err:?}"),
            }
            std::process::exit(1);
        }
    };

    print_value(&output, args.output)
}

async fn run(args: &Args) -> Result<Value> {
    let mut config = match args.config {
        Some(ref path) => Config::load_from(path),
        None => Config::load(),
    };

    match args.command {
        Command::Types => Ok(describe_types()),
        Command::SetSite { ref url } => {
            match args.config {
                Some(ref path) => config.set_site_in(url, path)?,
                None => config.set_site(url)?,
            }
            Ok(json!({"site": url}))
        }
        Command::Show {
            ref type_name,
            ref key,
            ref follow,
            all_associations,
        } => {
            let factory = connect(&config, args)?;
            let resource = Resource::find(&factory, type_name, key).await?;
            let names: Vec<String> = if all_associations {
                resource.associations().map(|a| a.name().to_string()).collect()
            } else {
                follow.clone()
            };
            show(&resource, &names).await
        }
        Command::List { ref type_name } => {
            let factory = connect(&config, args)?;
            let resources = Resource::all(&factory, type_name).await?;
            tracing::info!("Loaded {} {} resources", resources.len(), type_name);
            Ok(Value::Array(resources.iter().map(Resource::to_json).collect()))
        }
        Command::Delete {
            ref type_name,
            ref key,
        } => {
            let factory = connect(&config, args)?;
            let mut resource = factory.build(type_name, Some(key), json!({}))?;
            resource.delete().await?;
            Ok(json!({"deleted": resource.to_string()}))
        }
    }
}

/// Client for the command line site, or the configured one
fn connect(config: &Config, args: &Args) -> Result<ResourceFactory> {
    let client = match args.site {
        Some(ref site) => JiraClient::new(
            site,
            &config.api_path(),
            config.effective_credentials(),
            Duration::from_secs(config.timeout_secs),
        ),
        None => JiraClient::from_config(config),
    }
    .context("Failed to create JIRA client")?;
    Ok(ResourceFactory::with_builtin_types(Arc::new(client)))
}

async fn show(resource: &Resource, follow: &[String]) -> Result<Value> {
    let mut resolved = Map::new();
    for name in follow {
        let value = match resource.association(name)?.resolve().await? {
            Resolved::One(Some(target)) => target.to_json(),
            Resolved::One(None) => Value::Null,
            Resolved::Many(targets) => Value::Array(targets.iter().map(Resource::to_json).collect()),
        };
        resolved.insert(name.clone(), value);
    }

    Ok(json!({
        "type": resource.type_name(),
        "key": resource.key(),
        "attributes": resource.to_json(),
        "associations": resolved,
    }))
}

fn describe_types() -> Value {
    let registry = builtin_registry();
    let types = registry
        .type_names()
        .into_iter()
        .filter_map(|name| registry.resource_type(name))
        .map(|t| {
            json!({
                "name": t.name,
                "endpoint": t.endpoint_name(),
                "key_attribute": t.key_attribute,
                "associations": t.associations.iter().map(|a| json!({
                    "name": a.name,
                    "cardinality": a.cardinality,
                    "target": a.target,
                })).collect::<Vec<_>>(),
            })
        })
        .collect();
    Value::Array(types)
}

/// Columns shown by the table output
const TABLE_COLUMNS: &[&str] = &["id", "key", "name"];

fn print_value(value: &Value, format: OutputFormat) -> Result<()> {
    let rendered = match (format, value) {
        (OutputFormat::Table, Value::Array(rows)) => render_table(rows),
        (OutputFormat::Yaml, _) => serde_yaml::to_string(value)?,
        (OutputFormat::Json | OutputFormat::Table, _) => serde_json::to_string_pretty(value)?,
    };
    println!("{}", rendered.trim_end());
    Ok(())
}

fn render_table(rows: &[Value]) -> String {
    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| {
            TABLE_COLUMNS
                .iter()
                .map(|col| display_value(row.get(*col)))
                .collect()
        })
        .collect();

    let widths: Vec<usize> = TABLE_COLUMNS
        .iter()
        .enumerate()
        .map(|(i, col)| {
            cells
                .iter()
                .map(|row| row[i].chars().count())
                .chain(std::iter::once(col.len()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let line = |values: Vec<String>| {
        values
            .iter()
            .zip(&widths)
            .map(|(v, w)| format!("{:<width$}", v, width = *w))
            .collect::<Vec<_>>()
            .join("  ")
    };

    let header = line(TABLE_COLUMNS.iter().map(|c| c.to_uppercase()).collect());
    std::iter::once(header)
        .chain(cells.into_iter().map(line))
        .collect::<Vec<_>>()
        .join("\n")
}
