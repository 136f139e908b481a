use crate::cleaner::{Cleaner, CleanerSettings, CleanupReport, Statistics};
use crate::config::{default_config_path, Config, ConfigError};
use crate::filter_file;
use crate::filters::{Clock, Filter, FilterError, Operator, SystemClock};
use crate::format::{format_email_preview, format_size, parse_size};
use crate::gmail::client::GmailClient;
use crate::mailbox::{Label, MailboxError};
use clap::{Args, Parser, Subcommand};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

/// Entries shown per table in the text form of `stats`.
const STATS_DISPLAY_LIMIT: usize = 5;

#[derive(Parser, Debug)]
#[command(name = "mailsweep")]
#[command(version)]
#[command(about = "Find and bulk-clean Gmail messages with composable filters", long_about = None)]
pub struct Cli {
    /// Path to configuration file (default: $XDG_CONFIG_HOME/mailsweep/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Trash or delete messages matching the filters
    Clean(CleanArgs),

    /// List the account's labels
    Labels {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Show size and label/sender statistics for matching messages
    Stats {
        #[command(flatten)]
        filters: FilterArgs,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Print the compiled filter and the Gmail query it produces
    PrintFilter {
        #[command(flatten)]
        filters: FilterArgs,
    },

    /// Print the default config path and all options
    HelpConfig,
}

#[derive(Args, Debug, Default)]
pub struct FilterArgs {
    /// Messages older than N days
    #[arg(long, value_name = "DAYS")]
    pub older_than: Option<u32>,

    /// Messages dated before DATE (YYYY-MM-DD)
    #[arg(long, value_name = "DATE")]
    pub before: Option<String>,

    /// Sender pattern, `*` and `?` wildcards allowed
    #[arg(long, value_name = "PATTERN")]
    pub from: Option<String>,

    /// Label name (promotions, social, updates, forums, spam, trash, inbox, sent, or a user label)
    #[arg(long)]
    pub label: Option<String>,

    /// Subject pattern, `*` and `?` wildcards allowed
    #[arg(long, value_name = "PATTERN")]
    pub subject: Option<String>,

    /// Minimum size, e.g. 5MB
    #[arg(long, value_name = "SIZE")]
    pub larger_than: Option<String>,

    /// Maximum size, e.g. 100KB
    #[arg(long, value_name = "SIZE")]
    pub smaller_than: Option<String>,

    /// Only read messages
    #[arg(long, conflicts_with = "unread")]
    pub read: bool,

    /// Only unread messages
    #[arg(long)]
    pub unread: bool,

    /// Only messages with attachments
    #[arg(long, conflicts_with = "no_attachment")]
    pub has_attachment: bool,

    /// Only messages without attachments
    #[arg(long)]
    pub no_attachment: bool,

    /// Match any filter instead of all of them
    #[arg(long, conflicts_with = "operator")]
    pub any: bool,

    /// How to combine the filters: AND (default) or OR
    #[arg(long, value_name = "AND|OR")]
    pub operator: Option<String>,

    /// TOML filter definition, combined with the other filters
    #[arg(long, value_name = "PATH")]
    pub filter_file: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct CleanArgs {
    #[command(flatten)]
    pub filters: FilterArgs,

    /// Maximum number of messages to process (default from config)
    #[arg(long)]
    pub max_emails: Option<usize>,

    /// Only preview what would be removed
    #[arg(long, conflicts_with = "no_dry_run")]
    pub dry_run: bool,

    /// Actually remove messages, overriding `dry_run = true` in the config
    #[arg(long)]
    pub no_dry_run: bool,

    /// Delete permanently instead of moving to trash
    #[arg(long)]
    pub permanent: bool,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Messages per batch (default from config)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub batch_size: Option<u64>,

    /// Print JSON instead of text
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("{0}")]
    Config(#[from] ConfigError),
    #[error("{0}")]
    Filter(#[from] FilterError),
    #[error("{0}")]
    Mailbox(#[from] MailboxError),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("failed to encode JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl FilterArgs {
    /// Build the combined filter. `None` means every message matches.
    pub fn build(&self, clock: &dyn Clock) -> Result<Option<Filter>, FilterError> {
        let mut filters = Vec::new();

        if let Some(days) = self.older_than {
            filters.push(Filter::older_than(days, clock)?);
        }
        if let Some(ref date) = self.before {
            filters.push(Filter::before_str(date)?);
        }
        if let Some(ref pattern) = self.from {
            filters.push(Filter::sender(pattern)?);
        }
        if let Some(ref label) = self.label {
            filters.push(Filter::label(label));
        }
        if let Some(ref pattern) = self.subject {
            filters.push(Filter::subject(pattern)?);
        }

        let min = self.larger_than.as_deref().map(parse_size).transpose()?;
        let max = self.smaller_than.as_deref().map(parse_size).transpose()?;
        if min.is_some() || max.is_some() {
            filters.push(Filter::size(min, max)?);
        }

        if self.read {
            filters.push(Filter::read_status(true));
        } else if self.unread {
            filters.push(Filter::read_status(false));
        }
        if self.has_attachment {
            filters.push(Filter::has_attachment(true));
        } else if self.no_attachment {
            filters.push(Filter::has_attachment(false));
        }

        if let Some(ref path) = self.filter_file {
            filters.push(filter_file::load_filter(path, clock)?);
        }

        let operator = match self.operator {
            Some(ref op) => op.parse::<Operator>()?,
            None if self.any => Operator::Or,
            None => Operator::And,
        };
        Ok(Filter::combine(filters, operator))
    }
}

pub fn run(cli: Cli) -> Result<(), CliError> {
    let config_path = cli.config.clone().unwrap_or_else(default_config_path);

    match cli.command {
        Commands::HelpConfig => {
            print_help_config();
            Ok(())
        }
        Commands::PrintFilter { filters } => {
            let filter = filters.build(&SystemClock)?;
            print_filter(filter.as_ref());
            Ok(())
        }
        Commands::Labels { json } => {
            let config = load_config(&config_path)?;
            let cleaner = connect(&config, config.cleanup.batch_size)?;
            let labels = cleaner.preview_labels()?;
            print_labels(&labels, json)
        }
        Commands::Stats { filters, json } => {
            let filter = filters.build(&SystemClock)?;
            let config = load_config(&config_path)?;
            let cleaner = connect(&config, config.cleanup.batch_size)?;
            let stats = cleaner.get_statistics(filter.as_ref())?;
            print_statistics(&stats, json)
        }
        Commands::Clean(args) => run_clean(args, &config_path),
    }
}

fn load_config(path: &Path) -> Result<Config, CliError> {
    log_debug!("[CLI] Loading config from {}", path.display());
    Ok(Config::load(path)?)
}

fn connect(config: &Config, batch_size: usize) -> Result<Cleaner<GmailClient>, CliError> {
    let client = GmailClient::connect(&config.gmail)?;
    let settings = CleanerSettings {
        batch_size,
        rate_limit: config.cleanup.rate_limit,
    };
    Ok(Cleaner::new(client, settings))
}

fn run_clean(args: CleanArgs, config_path: &Path) -> Result<(), CliError> {
    let filter = args.filters.build(&SystemClock)?;
    let config = load_config(config_path)?;

    let dry_run = if args.dry_run {
        true
    } else if args.no_dry_run {
        false
    } else {
        config.cleanup.dry_run
    };
    let max_emails = args.max_emails.unwrap_or(config.cleanup.max_emails);
    let batch_size = args
        .batch_size
        .map(|n| n as usize)
        .unwrap_or(config.cleanup.batch_size);

    if !dry_run && !args.yes {
        let stdin = io::stdin();
        let mut input = stdin.lock();
        if !confirm(&mut input, filter.as_ref(), max_emails, args.permanent)? {
            println!("Aborted.");
            return Ok(());
        }
    }

    let cleaner = connect(&config, batch_size)?;
    let report = cleaner.clean_emails(filter.as_ref(), max_emails, dry_run, args.permanent)?;
    print_cleanup(&report, args.json)
}

fn confirm<R: BufRead>(
    input: &mut R,
    filter: Option<&Filter>,
    max_emails: usize,
    permanent: bool,
) -> Result<bool, CliError> {
    let action = if permanent {
        "PERMANENTLY DELETE"
    } else {
        "move to trash"
    };
    let criteria = filter
        .map(|f| f.to_string())
        .unwrap_or_else(|| "all messages".to_string());

    print!(
        "About to {} up to {} email(s) matching: {}\nContinue? [y/N] ",
        action, max_emails, criteria
    );
    io::stdout().flush()?;

    let mut line = String::new();
    input.read_line(&mut line)?;
    let answer = line.trim().to_lowercase();
    Ok(answer == "y" || answer == "yes")
}

fn print_filter(filter: Option<&Filter>) {
    match filter {
        Some(filter) => {
            println!("Filter: {}", filter);
            let query = filter.query_fragment();
            if query.is_empty() {
                println!("Query: (none, filtering is done locally)");
            } else {
                println!("Query: {}", query);
            }
        }
        None => {
            println!("Filter: (none, every message matches)");
            println!("Query: (none)");
        }
    }
}

fn print_labels(labels: &[Label], json: bool) -> Result<(), CliError> {
    if json {
        println!("{}", serde_json::to_string_pretty(labels)?);
        return Ok(());
    }

    if labels.is_empty() {
        println!("No labels found.");
        return Ok(());
    }
    println!("Labels ({}):", labels.len());
    for label in labels {
        println!("  {} ({})", label.name, label.id);
    }
    Ok(())
}

fn print_statistics(stats: &Statistics, json: bool) -> Result<(), CliError> {
    if json {
        println!("{}", serde_json::to_string_pretty(stats)?);
        return Ok(());
    }

    println!("Total emails: {}", stats.total_emails);
    println!("Total size: {}", stats.total_size_formatted);

    println!();
    println!("Top labels:");
    for tally in stats.label_distribution.iter().take(STATS_DISPLAY_LIMIT) {
        println!("  {}: {}", tally.name, tally.count);
    }

    println!();
    println!("Top sender domains:");
    for tally in stats.top_sender_domains.iter().take(STATS_DISPLAY_LIMIT) {
        println!("  {}: {}", tally.name, tally.count);
    }
    Ok(())
}

fn print_cleanup(report: &CleanupReport, json: bool) -> Result<(), CliError> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    let result = &report.result;
    if result.found == 0 {
        println!("No emails found matching the criteria.");
        return Ok(());
    }

    let verb = if result.permanent {
        "permanently deleted"
    } else {
        "moved to trash"
    };

    if result.dry_run {
        println!(
            "Dry run: {} email(s) would be {} ({})",
            result.found,
            verb,
            format_size(result.total_size)
        );
        for email in &report.preview {
            println!("  {}", format_email_preview(email));
        }
        if report.not_previewed > 0 {
            println!("  ... and {} more", report.not_previewed);
        }
    } else {
        println!(
            "{}/{} email(s) {} ({})",
            result.processed,
            result.found,
            verb,
            format_size(result.total_size)
        );
    }
    Ok(())
}

fn print_help_config() {
    let config_path = default_config_path();
    println!("Default config file: {}", config_path.display());
    println!();
    println!("Available options:");
    println!();
    println!("[gmail]");
    println!("  token_command = \"gcloud auth print-access-token\"  # Shell command printing an OAuth access token (required)");
    println!("  api_url = \"https://gmail.googleapis.com/gmail/v1\" # API base URL (default shown)");
    println!("  user_id = \"me\"                 # Mailbox to operate on (default: \"me\")");
    println!("  include_spam_trash = false     # Search spam and trash too (default: false)");
    println!();
    println!("[cleanup]");
    println!("  batch_size = 100               # Messages per trash/delete batch (default: 100)");
    println!("  rate_limit = 10                # Batches per second (default: 10)");
    println!("  max_emails = 500               # Default cap for `clean` (default: 500)");
    println!("  dry_run = true                 # Preview only unless --no-dry-run (default: true)");
    println!();
    println!("Filter files (--filter-file) are TOML:");
    println!();
    println!("  any = [");
    println!("    {{ from = \"*@newsletter.example\" }},");
    println!("    {{ all = [ {{ label = \"promotions\" }}, {{ older_than_days = 30 }} ] }},");
    println!("  ]");
    println!();
    println!("Leaf keys: older_than_days, before, from, subject, label, larger_than, smaller_than, read, has_attachment");
}
