//! kirha-mcp-installer CLI

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use kirha_mcp_installer::{ClientKind, Error, Installer, Operation, Request, Vertical};

#[derive(Parser)]
#[command(name = "kirha-mcp-installer")]
#[command(about = "Install the Kirha MCP gateway into your AI tools", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Install the Kirha MCP server into a client's configuration
    Install {
        /// Target client
        #[arg(short, long, value_enum)]
        client: ClientKind,

        /// Kirha vertical to register
        #[arg(long, value_enum, default_value_t = Vertical::Crypto)]
        vertical: Vertical,

        /// Kirha API key
        #[arg(short, long)]
        key: String,

        /// Custom config file location
        #[arg(long)]
        config_path: Option<PathBuf>,

        /// Report what would change without writing anything
        #[arg(long)]
        dry_run: bool,

        /// Proceed even if the client appears to be running
        #[arg(long)]
        force: bool,
    },

    /// Update an existing installation (new key and/or plan-mode toggle)
    Update {
        /// Target client
        #[arg(short, long, value_enum)]
        client: ClientKind,

        /// Kirha vertical to update
        #[arg(long, value_enum, default_value_t = Vertical::Crypto)]
        vertical: Vertical,

        /// New Kirha API key (omit to keep the stored one when toggling plan mode)
        #[arg(short, long)]
        key: Option<String>,

        /// Turn plan mode on
        #[arg(long, conflicts_with = "disable_plan_mode")]
        enable_plan_mode: bool,

        /// Turn plan mode off
        #[arg(long)]
        disable_plan_mode: bool,

        /// Custom config file location
        #[arg(long)]
        config_path: Option<PathBuf>,

        /// Report what would change without writing anything
        #[arg(long)]
        dry_run: bool,

        /// Proceed even if the client appears to be running
        #[arg(long)]
        force: bool,
    },

    /// Remove the Kirha MCP server from a client's configuration
    Remove {
        /// Target client
        #[arg(short, long, value_enum)]
        client: ClientKind,

        /// Kirha vertical to remove
        #[arg(long, value_enum, default_value_t = Vertical::Crypto)]
        vertical: Vertical,

        /// Custom config file location
        #[arg(long)]
        config_path: Option<PathBuf>,

        /// Report what would change without writing anything
        #[arg(long)]
        dry_run: bool,

        /// Proceed even if the client appears to be running
        #[arg(long)]
        force: bool,
    },

    /// Show a client's MCP configuration
    Show {
        /// Target client
        #[arg(short, long, value_enum)]
        client: ClientKind,

        /// Kirha vertical to look for
        #[arg(long, value_enum, default_value_t = Vertical::Crypto)]
        vertical: Vertical,

        /// Custom config file location
        #[arg(long)]
        config_path: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let installer = Installer::new();
    match cli.command {
        Commands::Show {
            client,
            vertical,
            config_path,
        } => {
            let mut request = Request::new(client, vertical, Operation::Show);
            request.config_path = config_path;
            request.verbose = cli.verbose;
            match installer.show(&request) {
                Ok(result) => {
                    println!("{}", result.message);
                    ExitCode::SUCCESS
                }
                Err(err) => report_error(&err),
            }
        }
        command => {
            let request = build_request(command, cli.verbose);
            match installer.execute(&request) {
                Ok(result) => {
                    println!("{}", result.message);
                    if let Some(backup) = &result.backup_path {
                        println!("Backup created at: {}", backup.display());
                    }
                    ExitCode::SUCCESS
                }
                Err(err) => report_error(&err),
            }
        }
    }
}

fn build_request(command: Commands, verbose: bool) -> Request {
    let mut request = match command {
        Commands::Install {
            client,
            vertical,
            key,
            config_path,
            dry_run,
            force,
        } => {
            let mut request = Request::new(client, vertical, Operation::Install);
            request.api_key = key;
            request.config_path = config_path;
            request.dry_run = dry_run;
            request.force = force;
            request
        }
        Commands::Update {
            client,
            vertical,
            key,
            enable_plan_mode,
            disable_plan_mode,
            config_path,
            dry_run,
            force,
        } => {
            let plan_mode = if enable_plan_mode {
                Some(true)
            } else if disable_plan_mode {
                Some(false)
            } else {
                None
            };
            let mut request = Request::new(client, vertical, Operation::Update);
            // Plan-mode-only updates may keep the stored key; everything else
            // needs one on the command line.
            request.reuse_existing_key = key.is_none() && plan_mode.is_some();
            request.api_key = key.unwrap_or_default();
            request.plan_mode = plan_mode;
            request.config_path = config_path;
            request.dry_run = dry_run;
            request.force = force;
            request
        }
        Commands::Remove {
            client,
            vertical,
            config_path,
            dry_run,
            force,
        } => {
            let mut request = Request::new(client, vertical, Operation::Remove);
            request.config_path = config_path;
            request.dry_run = dry_run;
            request.force = force;
            request
        }
        Commands::Show { .. } => unreachable!("show is handled separately"),
    };
    request.verbose = verbose;
    request
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let default = if verbose {
        "kirha_mcp_installer=debug"
    } else {
        "kirha_mcp_installer=warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn report_error(err: &Error) -> ExitCode {
    eprintln!("Error: {}", err);
    if let Some(hint) = hint_for(err) {
        eprintln!("Hint: {}", hint);
    }
    ExitCode::FAILURE
}

fn hint_for(err: &Error) -> Option<&'static str> {
    match err {
        Error::ClientRunning(_) => {
            Some("Close the application first, or pass --force to modify its config anyway.")
        }
        Error::ApiKeyRequired => Some("Provide an API key with --key."),
        Error::ApiKeyInvalid => Some("API keys must not contain spaces."),
        Error::AlreadyInstalled(_) => {
            Some("Use 'update' to change the existing installation.")
        }
        Error::NotFoundForUpdate(_) | Error::NotFoundForRemove(_) => {
            Some("Use 'install' to set it up first.")
        }
        Error::PermissionDenied(_) => {
            Some("Check the file's permissions, or re-run with sufficient privileges.")
        }
        _ => None,
    }
}
