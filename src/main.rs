//! Mailmerge CLI.
//!
//! # Commands
//!
//! - `mailmerge send` - Send one message per contact and write the outcomes
//! - `mailmerge channels` - List the `mail_channel` values of a channel definitions file

use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::error;
use tracing_subscriber::EnvFilter;

use mailmerge::mailmerge_config::{EnvLoader, RecipeConfig};
use mailmerge::mailmerge_mail::{StaticChannelRegistry, channel_choices};
use mailmerge::{CsvOutputSink, CsvRowSource, CsvTable, MailJob, PlatformCapabilities, Result};

/// Templated bulk mail from a contacts file
#[derive(Parser)]
#[command(name = "mailmerge")]
#[command(version)]
#[command(about = "Send one personalized message per contact and record the outcome of each")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Send one message per contact
    #[command(alias = "s")]
    Send(SendArgs),

    /// List the channel choices of a channel definitions file
    Channels(ChannelsArgs),
}

#[derive(Args)]
struct SendArgs {
    /// Job configuration (.json, .toml or .env)
    #[arg(short, long, env = "MAILMERGE_CONFIG")]
    config: PathBuf,

    /// Contacts CSV file with a header line
    #[arg(long)]
    contacts: PathBuf,

    /// Output CSV file
    #[arg(short, long)]
    output: PathBuf,

    /// Field delimiter of the contacts file
    #[arg(long, default_value_t = ',')]
    delimiter: char,

    /// Attachment table as a CSV file, optionally prefixed with its project (`PROJECT:path`)
    #[arg(short, long = "attachment", value_parser = parse_attachment)]
    attachments: Vec<(Option<String>, PathBuf)>,

    /// Project running the job
    #[arg(short, long, default_value = "LOCAL")]
    project: String,

    /// Channel definitions file
    #[arg(long, env = "MAILMERGE_CHANNELS")]
    channels: Option<PathBuf>,

    /// Override a configuration value
    #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_override)]
    overrides: Vec<(String, Value)>,
}

#[derive(Args)]
struct ChannelsArgs {
    /// Channel definitions file
    #[arg(long, env = "MAILMERGE_CHANNELS")]
    channels: Option<PathBuf>,
}

fn parse_attachment(value: &str) -> std::result::Result<(Option<String>, PathBuf), String> {
    match value.split_once(':') {
        Some((project, path)) if !project.is_empty() && !project.contains(['/', '\\', '.']) => {
            Ok((Some(project.to_string()), PathBuf::from(path)))
        }
        _ if value.is_empty() => Err("empty attachment path".to_string()),
        _ => Ok((None, PathBuf::from(value))),
    }
}

fn parse_override(value: &str) -> std::result::Result<(String, Value), String> {
    let (key, raw) = value
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", value))?;
    let key = key.trim();
    if key.is_empty() {
        return Err("empty configuration key".to_string());
    }
    let value = match serde_json::from_str::<Value>(raw) {
        Ok(parsed) if !parsed.is_object() && !parsed.is_array() => parsed,
        _ => Value::String(raw.to_string()),
    };
    Ok((key.to_string(), value))
}

fn init_tracing(verbose: bool, quiet: bool) {
    let level = if quiet {
        "warn"
    } else if verbose {
        "debug"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_registry(path: Option<&PathBuf>) -> Result<StaticChannelRegistry> {
    match path {
        Some(path) => mailmerge::load_channels(path),
        None => Ok(StaticChannelRegistry::new()),
    }
}

async fn send(args: SendArgs) -> Result<()> {
    let mut config = RecipeConfig::from_file(&args.config)?;
    config.merge(EnvLoader::default().load());
    for (key, value) in args.overrides {
        config.set(key, value);
    }

    let registry = load_registry(args.channels.as_ref())?;

    let mut job = MailJob::new(config)
        .project_key(args.project.clone())
        .capabilities(PlatformCapabilities::default())
        .channels(Arc::new(registry));
    for (project, path) in &args.attachments {
        let project = project.clone().unwrap_or_else(|| args.project.clone());
        job = job.attachment(Arc::new(CsvTable::open(path, project)?));
    }

    let delimiter = u8::try_from(args.delimiter).map_err(|_| {
        mailmerge::JobError::Source(format!("unsupported delimiter '{}'", args.delimiter))
    })?;
    let mut contacts = CsvRowSource::with_delimiter(&args.contacts, delimiter)?;
    let mut output = CsvOutputSink::create(&args.output)?;

    let summary = job.run(&mut contacts, &mut output).await?;
    println!(
        "{} sent, {} succeeded, {} failed -> {}",
        summary.sent,
        summary.succeeded,
        summary.failed,
        args.output.display()
    );
    Ok(())
}

fn list_channels(args: ChannelsArgs) -> Result<()> {
    let registry = load_registry(args.channels.as_ref())?;
    for choice in channel_choices(&registry) {
        match choice.value {
            Some(value) => println!("{}\t{}", value, choice.label),
            None => println!("(unset)\t{}", choice.label),
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let result = match cli.command {
        Commands::Send(args) => send(args).await,
        Commands::Channels(args) => list_channels(args),
    };

    if let Err(e) = result {
        error!(error = %e, "Mail job failed");
        std::process::exit(1);
    }
}
