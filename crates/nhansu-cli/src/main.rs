//! nhansu - command line client for the HR management API.
//!
//! Logs in against the token endpoint, keeps the credential pair in the
//! configured store, and lists or updates HR resources. Expired access
//! tokens are refreshed transparently; when the session cannot be recovered
//! the user is sent back to `nhansu login`.

mod app;

use std::io;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use app::App;

#[derive(Debug, Parser)]
#[command(name = "nhansu", version, about = "HR management client")]
struct Cli {
    /// Print resources as JSON instead of text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, clap::Subcommand)]
enum Command {
    /// Log in and store the token pair.
    Login(LoginArgs),
    /// Forget the stored token pair.
    Logout,
    /// Show whether a session is active.
    Status,
    /// List one kind of resource.
    List(ListArgs),
    /// Fetch every resource at once.
    Sync,
    /// Approve a pending leave request.
    Approve {
        /// Leave request id.
        id: i64,
    },
    /// Reject a pending leave request.
    Reject {
        /// Leave request id.
        id: i64,
    },
}

#[derive(Debug, clap::Args)]
struct LoginArgs {
    /// Username (defaults to the last one used).
    #[arg(long, short)]
    username: Option<String>,
    /// Password; prompted for when not set.
    #[arg(long, env = "NHANSU_PASSWORD", hide_env_values = true)]
    password: Option<String>,
}

#[derive(Debug, clap::Args)]
struct ListArgs {
    #[arg(value_enum)]
    resource: Resource,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum Resource {
    Departments,
    Positions,
    Employees,
    Attendance,
    Leave,
}

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // RUST_LOG controls the level (e.g., RUST_LOG=nhansu_core=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing();
    info!(command = ?cli.command, "nhansu starting");

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let mut app = App::new(cli.json)?;

    match cli.command {
        Command::Login(args) => app.login(args.username, args.password).await,
        Command::Logout => Ok(app.logout()),
        Command::Status => Ok(app.status()),
        Command::List(args) => app.list(args.resource).await,
        Command::Sync => app.sync().await,
        Command::Approve { id } => app.decide_leave(id, true).await,
        Command::Reject { id } => app.decide_leave(id, false).await,
    }
}
