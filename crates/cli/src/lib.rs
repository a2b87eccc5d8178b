pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use commands::review::{ReviewAction, ReviewArgs};

#[derive(Debug, Parser)]
#[command(
    name = "paydeck",
    about = "Paydeck operator CLI",
    long_about = "Operate Paydeck migrations, demo data, week listings, review transitions, and check-run printing.",
    after_help = "Examples:\n  paydeck migrate\n  paydeck seed\n  paydeck weeks --as auth-admin --company c-harbor\n  paydeck bulk-send --as auth-clerk --company c-harbor --week 2026-08-02 --yes\n  paydeck print --as auth-admin --company c-harbor --week 2026-08-02"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations")]
    Migrate,
    #[command(about = "Load the deterministic demo dataset")]
    Seed,
    #[command(about = "Inspect effective configuration values with secrets redacted")]
    Config,
    #[command(about = "List visible checks grouped into week buckets")]
    Weeks {
        #[arg(long = "as", help = "Acting user's auth id")]
        acting_uid: String,
        #[arg(long, help = "Narrow to one company")]
        company: Option<String>,
        #[arg(long, help = "Narrow to the week containing this date (YYYY-MM-DD)")]
        week: Option<String>,
        #[arg(long, help = "Substring match on employee or creator name")]
        search: Option<String>,
    },
    #[command(about = "Send a whole company week for review as one request")]
    SendWeek {
        #[arg(long = "as")]
        acting_uid: String,
        #[arg(long)]
        company: String,
        #[arg(long)]
        week: String,
    },
    #[command(about = "Create one review request per unreviewed check in a company week")]
    BulkSend {
        #[arg(long = "as")]
        acting_uid: String,
        #[arg(long)]
        company: String,
        #[arg(long)]
        week: String,
        #[arg(long, help = "Commit the plan instead of only printing it")]
        yes: bool,
    },
    #[command(about = "Admin: mark every unreviewed check in a company week as reviewed")]
    MarkReviewed {
        #[arg(long = "as")]
        acting_uid: String,
        #[arg(long)]
        company: String,
        #[arg(long)]
        week: String,
        #[arg(long, help = "Commit the plan instead of only printing it")]
        yes: bool,
    },
    #[command(about = "Admin: review one check, updating its correlated requests")]
    Review {
        #[arg(long = "as")]
        acting_uid: String,
        #[arg(long)]
        check: String,
        #[arg(long, help = "Revert the review instead")]
        undo: bool,
    },
    #[command(about = "Admin: clear the paid flag on one check")]
    UnmarkPaid {
        #[arg(long = "as")]
        acting_uid: String,
        #[arg(long)]
        check: String,
    },
    #[command(about = "Render a week's checks to a printable document and mark them paid")]
    Print {
        #[arg(long = "as")]
        acting_uid: String,
        #[arg(long)]
        company: String,
        #[arg(long)]
        week: String,
        #[arg(long, help = "Output file (defaults into the configured export directory)")]
        out: Option<PathBuf>,
    },
}

fn init_logging() {
    use paydeck_core::config::{AppConfig, LoadOptions, LogFormat};
    use tracing::Level;

    let Ok(config) = AppConfig::load(LoadOptions::default()) else {
        // the failing command will report the config problem itself
        return;
    };
    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(log_level)
        .with_writer(std::io::stderr);
    let initialized = match config.logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    // a second init in-process (tests) is fine to ignore
    let _ = initialized;
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    init_logging();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Weeks { acting_uid, company, week, search } => {
            commands::weeks::run(commands::weeks::WeeksArgs {
                acting_uid,
                company,
                week,
                search,
            })
        }
        Command::SendWeek { acting_uid, company, week } => commands::review::run(ReviewArgs {
            acting_uid,
            action: ReviewAction::SendWeek { company, week },
        }),
        Command::BulkSend { acting_uid, company, week, yes } => {
            commands::review::run(ReviewArgs {
                acting_uid,
                action: ReviewAction::BulkSend { company, week, confirmed: yes },
            })
        }
        Command::MarkReviewed { acting_uid, company, week, yes } => {
            commands::review::run(ReviewArgs {
                acting_uid,
                action: ReviewAction::MarkReviewed { company, week, confirmed: yes },
            })
        }
        Command::Review { acting_uid, check, undo } => commands::review::run(ReviewArgs {
            acting_uid,
            action: ReviewAction::ReviewCheck { check_id: check, undo },
        }),
        Command::UnmarkPaid { acting_uid, check } => commands::review::run(ReviewArgs {
            acting_uid,
            action: ReviewAction::UnmarkPaid { check_id: check },
        }),
        Command::Print { acting_uid, company, week, out } => {
            commands::print::run(commands::print::PrintArgs { acting_uid, company, week, out })
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
