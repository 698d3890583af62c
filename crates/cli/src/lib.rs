pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

use tripflow_core::chain::ApprovalRole;
use tripflow_core::config::{AppConfig, LoadOptions, LogFormat};

#[derive(Debug, Parser)]
#[command(
    name = "tripflow",
    about = "Tripflow approval workflow CLI",
    long_about = "Run migrations, inspect configuration, and move business trips and expense \
                  claims through the approval chain.",
    after_help = "Examples:\n  tripflow migrate\n  tripflow seed\n  tripflow submit BT-001 --actor E-100\n  tripflow approve BT-001 --actor E-200 --expected-step supervisor\n  tripflow reject BT-001 --actor E-300 --expected-step staff_ga --reason \"budget exceeded\"\n  tripflow pending --actor E-200"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the demo organization and draft records")]
    Seed,
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
    #[command(about = "Show one record with its status label, approval history and timeline")]
    Show { record_id: String },
    #[command(about = "Submit a draft into the approval chain")]
    Submit {
        record_id: String,
        #[command(flatten)]
        actor: commands::ActorArgs,
    },
    #[command(about = "Approve the current step of a record")]
    Approve {
        record_id: String,
        #[command(flatten)]
        actor: commands::ActorArgs,
        #[arg(long, help = "Step being approved, as shown by `tripflow show` (e.g. staff_ga)")]
        expected_step: ApprovalRole,
    },
    #[command(about = "Reject a record at its current step")]
    Reject {
        record_id: String,
        #[command(flatten)]
        actor: commands::ActorArgs,
        #[arg(long, help = "Step being rejected, as shown by `tripflow show`")]
        expected_step: ApprovalRole,
        #[arg(long, help = "Why the record is rejected")]
        reason: String,
    },
    #[command(about = "List submitted records the actor can approve or reject right now")]
    Pending {
        #[command(flatten)]
        actor: commands::ActorArgs,
        #[arg(long, help = "Maximum number of records (defaults to workflow.list_limit)")]
        limit: Option<u32>,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    init_logging();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Config => commands::config::run(),
        Command::Show { record_id } => commands::show::run(&record_id),
        Command::Submit { record_id, actor } => commands::workflow::submit(&record_id, &actor),
        Command::Approve { record_id, actor, expected_step } => {
            commands::workflow::approve(&record_id, &actor, expected_step)
        }
        Command::Reject { record_id, actor, expected_step, reason } => {
            commands::workflow::reject(&record_id, &actor, expected_step, &reason)
        }
        Command::Pending { actor, limit } => commands::pending::run(&actor, limit),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

/// Logs go to stderr so stdout carries only the JSON payload. A broken config
/// still gets default logging; the command itself reports the config error.
fn init_logging() {
    use tracing::Level;

    let config = AppConfig::load(LoadOptions::default()).unwrap_or_default();
    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_max_level(log_level);

    let initialized = match config.logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    if initialized.is_err() {
        eprintln!("tripflow: a global tracing subscriber was already installed");
    }
}
