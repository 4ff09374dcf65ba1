use crate::commands;
use crate::server;
use clap::{Args, Parser, Subcommand};
use lor_review::config::AppConfig;
use lor_review::error::AppError;
use lor_review::telemetry;

#[derive(Parser, Debug)]
#[command(
    name = "LOR Review",
    about = "Review applicants and issue recommendation letters from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Inspect or register applicants
    Applicants {
        #[command(subcommand)]
        command: ApplicantsCommand,
    },
    /// Generate, store, and email the recommendation letter
    Approve(ActionArgs),
    /// Email the rejection notice
    Reject(ActionArgs),
    /// Remove the applicant record
    Delete(UsernameArg),
    /// Store an applicant's personal details
    SubmitDetails(DetailsArgs),
    /// Show which catalog branch a free-text branch resolves to
    MatchBranch(MatchBranchArgs),
}

#[derive(Subcommand, Debug)]
pub(crate) enum ApplicantsCommand {
    /// Print every applicant in insertion order
    List(ListArgs),
    /// Add a pending applicant as the sign-up form does
    Register(RegisterArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Log outgoing emails instead of sending them
    #[arg(long)]
    pub(crate) dry_run: bool,
}

#[derive(Args, Debug)]
pub(crate) struct UsernameArg {
    pub(crate) username: String,
}

#[derive(Args, Debug)]
pub(crate) struct ActionArgs {
    pub(crate) username: String,
    /// Log outgoing emails instead of sending them
    #[arg(long)]
    pub(crate) dry_run: bool,
}

#[derive(Args, Debug)]
pub(crate) struct ListArgs {
    /// Emit CSV instead of a table
    #[arg(long)]
    pub(crate) csv: bool,
}

#[derive(Args, Debug)]
pub(crate) struct RegisterArgs {
    pub(crate) username: String,
    #[arg(long)]
    pub(crate) email: String,
    #[arg(long)]
    pub(crate) password: String,
    /// HigherStudies or Professional
    #[arg(long)]
    pub(crate) requirement: Option<String>,
    #[arg(long)]
    pub(crate) gender: Option<String>,
}

#[derive(Args, Debug)]
pub(crate) struct DetailsArgs {
    pub(crate) username: String,
    #[arg(long)]
    pub(crate) full_name: Option<String>,
    #[arg(long)]
    pub(crate) branch: Option<String>,
    #[arg(long)]
    pub(crate) specialization: Option<String>,
    #[arg(long)]
    pub(crate) phone: Option<String>,
    /// Log the reminder email instead of sending it
    #[arg(long)]
    pub(crate) dry_run: bool,
}

#[derive(Args, Debug)]
pub(crate) struct MatchBranchArgs {
    pub(crate) text: String,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    match command {
        Command::Serve(args) => server::run(args, config).await,
        Command::Applicants {
            command: ApplicantsCommand::List(args),
        } => commands::list_applicants(&config, args),
        Command::Applicants {
            command: ApplicantsCommand::Register(args),
        } => commands::register_applicant(&config, args),
        Command::Approve(args) => commands::approve(&config, args),
        Command::Reject(args) => commands::reject(&config, args),
        Command::Delete(args) => commands::delete(&config, args),
        Command::SubmitDetails(args) => commands::submit_details(&config, args),
        Command::MatchBranch(args) => commands::match_branch(&config, args),
    }
}
