//! taskdesk - data-layer tools for the taskdesk task manager.

use std::io::BufRead;
use std::sync::Arc;

use taskdesk::app::{permissions_report, App};
use taskdesk::cli::{Cli, Command};
use taskdesk::config::{env_vars, Config, DatabaseConfig};
use taskdesk::connection::{global, ConnectionManager};
use taskdesk::db::{Connector, MockConnector, PgConnector};
use taskdesk::error::{Result, TaskdeskError};
use taskdesk::logging;
use taskdesk::secrets::SecretStorage;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    // A missing .env file is normal outside development.
    dotenvy::dotenv().ok();

    let cli = Cli::parse_args();

    if cli.log_file {
        logging::init_file_logging();
    } else {
        logging::init_stderr_logging();
    }

    if let Err(e) = run(cli).await {
        error!("{}: {}", e.category(), e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    if !cli.command.needs_database() {
        return run_local(&cli);
    }

    let mut config = resolve_config(&cli)?;

    if !cli.mock_db && !SecretStorage::new().resolve_password(&mut config)? {
        warn!("No database password configured; relying on server authentication");
    }

    let connector: Arc<dyn Connector> = if cli.mock_db {
        Arc::new(MockConnector::new())
    } else {
        Arc::new(PgConnector::new())
    };

    let manager = global::install(ConnectionManager::new(connector, config)?)?;
    let app = App::new(manager);

    let result = match app.startup().await {
        Ok(()) => app.execute(&cli.command).await,
        Err(e) => Err(e),
    };

    manager.shutdown().await;

    println!("{}", result?);
    Ok(())
}

/// Runs the commands that never open a session.
fn run_local(cli: &Cli) -> Result<()> {
    match &cli.command {
        Command::Permissions { role } => {
            println!("{}", permissions_report(*role));
            Ok(())
        }
        Command::SetPassword { clear } => {
            let config = resolve_config(cli)?;
            let storage = keyring_storage()?;
            if *clear {
                clear_password(&storage, &config)
            } else {
                set_password(&storage, &config)
            }
        }
        other => Err(TaskdeskError::internal(format!(
            "{other:?} needs a database session"
        ))),
    }
}

/// Resolves connection parameters. Later sources win: config file,
/// environment, command line.
fn resolve_config(cli: &Cli) -> Result<DatabaseConfig> {
    let config_path = cli.config_path();
    info!("Loading config from: {}", config_path.display());
    let mut config = Config::load_from_file(&config_path)?.database;

    config.apply_env()?;

    cli.apply_overrides(&mut config)?;

    config.validate()?;
    info!("Connection: {}", config.display_string());
    Ok(config)
}

fn keyring_storage() -> Result<SecretStorage> {
    let storage = SecretStorage::new();
    if !storage.is_available() {
        return Err(TaskdeskError::secret(format!(
            "OS keyring is unavailable. Set {} instead",
            env_vars::PASSWORD
        )));
    }
    Ok(storage)
}

/// Stores the database password in the OS keyring.
///
/// The password comes from the environment, or from one line of stdin.
fn set_password(storage: &SecretStorage, config: &DatabaseConfig) -> Result<()> {
    let password = match &config.password {
        Some(password) => password.clone(),
        None => read_password_line()?,
    };
    if password.is_empty() {
        return Err(TaskdeskError::secret("Password must not be empty"));
    }

    let key = SecretStorage::database_password_key(config);
    storage.store(&key, &password)?;

    println!(
        "Stored password {} for {}",
        SecretStorage::mask_secret(&password),
        config.display_string()
    );
    Ok(())
}

fn clear_password(storage: &SecretStorage, config: &DatabaseConfig) -> Result<()> {
    storage.delete(&SecretStorage::database_password_key(config))?;
    println!("Removed stored password for {}", config.display_string());
    Ok(())
}

fn read_password_line() -> Result<String> {
    eprint!("Database password: ");
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .map_err(|e| TaskdeskError::secret(format!("Failed to read password: {e}")))?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}
