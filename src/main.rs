//! goalpost: command line access to the tracker database.
//!
//! Applies migrations, prints analytics reports and inspects the audit log.
//! Every report is written to stdout as pretty JSON.

use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use goalpost::audit::AuditedTable;
use goalpost::commands::{analytics, audit, Page};
use goalpost::config::{self, AppConfig};
use goalpost::db::SharedDatabase;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "goalpost")]
#[command(about = "Goal and habit tracker data layer", version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, env = "GOALPOST_CONFIG")]
    config: Option<PathBuf>,

    /// Database file (overrides config file)
    #[arg(short, long, env = "GOALPOST_DATABASE")]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    #[command(flatten)]
    Data(DataCommand),

    /// Show or write the configuration file
    #[command(subcommand)]
    Config(ConfigCommand),
}

/// Commands that need the database.
#[derive(Subcommand)]
enum DataCommand {
    /// Create or upgrade the database schema
    Migrate,

    /// Aggregate reports and rankings
    Report {
        #[arg(value_enum)]
        kind: ReportKind,

        #[command(flatten)]
        page: PageArgs,

        /// Evaluate challenge timing on this date (default: today)
        #[arg(long)]
        today: Option<NaiveDate>,
    },

    /// Timing and participation of one challenge
    Challenge {
        id: i64,

        #[arg(long)]
        today: Option<NaiveDate>,
    },

    /// Rank the goals or users taking part in a challenge
    Leaderboard {
        #[arg(value_enum)]
        kind: LeaderboardKind,

        challenge_id: i64,

        #[command(flatten)]
        page: PageArgs,
    },

    /// Inspect the audit log
    #[command(subcommand)]
    Audit(AuditCommand),
}

#[derive(Clone, Copy, ValueEnum)]
enum ReportKind {
    UserProgress,
    UsersByGoals,
    UsersByHabits,
    UsersBySubscribers,
    Categories,
    Challenges,
    PopularChallenges,
}

#[derive(Clone, Copy, ValueEnum)]
enum LeaderboardKind {
    Goals,
    Users,
}

#[derive(Subcommand)]
enum AuditCommand {
    /// Newest entries first
    List {
        #[command(flatten)]
        page: PageArgs,
    },
    /// One entry by id
    Show { id: i64 },
    /// Every change recorded for one row
    History {
        /// Table name, e.g. `goals`
        table: AuditedTable,
        record_id: i64,
    },
    /// Delete one entry
    Prune { id: i64 },
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Print the effective configuration
    Show,
    /// Write the default configuration file
    Init,
}

#[derive(Args)]
struct PageArgs {
    /// Page size
    #[arg(long)]
    limit: Option<u32>,

    /// Rows to skip
    #[arg(long, default_value_t = 0)]
    offset: u32,
}

impl PageArgs {
    fn page(&self, config: &AppConfig) -> Page {
        Page::new(self.limit, self.offset).with_limits(config.page_limits())
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let mut out = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut out, value)?;
    writeln!(out)?;
    Ok(())
}

fn today_or_now(today: Option<NaiveDate>) -> NaiveDate {
    today.unwrap_or_else(|| chrono::Local::now().date_naive())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = config::load_config(cli.config.as_deref()).context("Failed to load config")?;
    if let Some(database) = cli.database.clone() {
        config.database_path = database;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    log::debug!("Using database {}", config.database_path.display());

    match cli.command {
        Command::Config(command) => run_config(&command, &config, cli.config),
        Command::Data(command) => {
            let db = goalpost::open_database(&config.database_path)
                .with_context(|| format!("Failed to open {}", config.database_path.display()))?;
            run(command, &db, &config)
        }
    }
}

fn run(command: DataCommand, db: &SharedDatabase, config: &AppConfig) -> anyhow::Result<()> {
    match command {
        DataCommand::Migrate => {
            log::info!("Database schema is up to date");
            Ok(())
        }
        DataCommand::Report { kind, page, today } => {
            let page = page.page(config);
            let today = today_or_now(today);
            match kind {
                ReportKind::UserProgress => print_json(&analytics::user_progress_report(db, page)?),
                ReportKind::UsersByGoals => print_json(&analytics::top_users_by_goals(db, page)?),
                ReportKind::UsersByHabits => print_json(&analytics::top_users_by_habits(db, page)?),
                ReportKind::UsersBySubscribers => {
                    print_json(&analytics::top_users_by_subscribers(db, page)?)
                }
                ReportKind::Categories => print_json(&analytics::category_report(db, page)?),
                ReportKind::Challenges => print_json(&analytics::challenge_report(db, page, today)?),
                ReportKind::PopularChallenges => {
                    print_json(&analytics::top_challenges(db, page, today)?)
                }
            }
        }
        DataCommand::Challenge { id, today } => {
            print_json(&analytics::challenge_details(db, id, today_or_now(today))?)
        }
        DataCommand::Leaderboard {
            kind,
            challenge_id,
            page,
        } => {
            let page = page.page(config);
            match kind {
                LeaderboardKind::Goals => {
                    print_json(&analytics::challenge_goal_leaderboard(db, challenge_id, page)?)
                }
                LeaderboardKind::Users => {
                    print_json(&analytics::challenge_user_leaderboard(db, challenge_id, page)?)
                }
            }
        }
        DataCommand::Audit(command) => match command {
            AuditCommand::List { page } => {
                print_json(&audit::list_audit_entries(db, page.page(config))?)
            }
            AuditCommand::Show { id } => print_json(&audit::get_audit_entry(db, id)?),
            AuditCommand::History { table, record_id } => {
                print_json(&audit::get_record_history(db, table, record_id)?)
            }
            AuditCommand::Prune { id } => {
                if !audit::delete_audit_entry(db, id)? {
                    anyhow::bail!("Audit entry {id} not found");
                }
                Ok(())
            }
        },
    }
}

fn run_config(
    command: &ConfigCommand,
    config: &AppConfig,
    path: Option<PathBuf>,
) -> anyhow::Result<()> {
    match command {
        ConfigCommand::Show => print_json(config),
        ConfigCommand::Init => {
            let path = path.unwrap_or_else(config::get_config_path);
            if path.exists() {
                anyhow::bail!("{} already exists", path.display());
            }
            config::save_config(&AppConfig::default(), &path)?;
            log::info!("Wrote {}", path.display());
            Ok(())
        }
    }
}
