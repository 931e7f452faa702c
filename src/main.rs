//! pgbind - command line entry point.
//!
//! Renders templates offline, executes templated statements and tails
//! LISTEN/NOTIFY channels.

use clap::Parser;
use pgbind::bind::{BindValue, Vars, expand};
use pgbind::config::{Command, Config, TemplateArgs};
use pgbind::db::{Connection, Listener, connect};
use pgbind::error::{DalError, DalResult};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    // stdout carries command output, logs go to stderr
    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

/// Collect `--var` and `--list` arguments as bind pairs, in command line order.
fn bind_pairs(args: &TemplateArgs) -> Vec<(String, BindValue)> {
    let mut pairs: Vec<(String, BindValue)> = args
        .vars
        .iter()
        .map(|var| (var.key.clone(), BindValue::from(var.value.as_str())))
        .collect();
    for list in &args.lists {
        let items = list
            .value
            .split(',')
            .filter(|item| !item.is_empty())
            .map(BindValue::from)
            .collect();
        pairs.push((list.key.clone(), BindValue::List(items)));
    }
    pairs
}

fn database_url(config: &Config) -> DalResult<&str> {
    config
        .database_url
        .as_deref()
        .ok_or_else(|| DalError::bad_parameter("--database-url or DATABASE_URL is required"))
}

async fn run(config: Config) -> DalResult<()> {
    match &config.command {
        Command::Render { template, args } => {
            let vars = Vars::from_pairs(bind_pairs(args));
            println!("{}", expand(template, &vars));
        }
        Command::Exec { template, args } => {
            let pool = connect(database_url(&config)?, &config.pool_options()).await?;
            let conn = Connection::with_options(pool.clone(), config.connection_options())
                .with(bind_pairs(args));
            let result = conn.exec(template).await;
            pool.close().await;
            let affected = result?;
            info!(rows_affected = affected, "Statement executed");
            println!("{affected}");
        }
        Command::Listen { topics } => {
            let pool = connect(database_url(&config)?, &config.pool_options()).await?;
            let listener = Listener::new(&pool);
            let result = listen_until_interrupted(&listener, topics).await;
            let closed = listener.close().await;
            pool.close().await;
            result?;
            closed?;
        }
    }
    Ok(())
}

async fn listen_until_interrupted(listener: &Listener, topics: &[String]) -> DalResult<()> {
    for topic in topics {
        listener.listen(topic).await?;
    }
    info!(topics = ?topics, "Waiting for notifications");

    loop {
        let interrupted = async {
            let _ = tokio::signal::ctrl_c().await;
        };
        match listener.wait_for_notification_until(interrupted).await {
            Ok(notification) => match serde_json::to_string(&notification) {
                Ok(line) => println!("{line}"),
                Err(e) => error!(error = %e, "Failed to encode notification"),
            },
            Err(DalError::Cancelled { .. }) => {
                info!("Interrupted, shutting down");
                return Ok(());
            }
            Err(e) => return Err(e),
        }
    }
}

#[tokio::main]
async fn main() {
    // Parse configuration from command line and environment
    let config = Config::parse();

    // Initialize logging
    init_tracing(&config);

    if let Err(e) = run(config).await {
        error!(error = %e, "Command failed");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
