use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use spacetime_client::{Client, ClientConfig, ClientError};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("missing token; pass --token or set SPACETIME_TOKEN")]
    MissingToken,
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "spacetime-cli", about = "Database service HTTP and websocket CLI")]
struct Cli {
    #[arg(long, env = "SPACETIME_BASE_URL", default_value = "http://127.0.0.1:3000")]
    base_url: String,

    #[arg(long, env = "SPACETIME_DB_NAME", default_value = "quickstart-chat")]
    db_name: String,

    #[arg(long, env = "SPACETIME_TOKEN")]
    token: Option<String>,

    #[arg(long, env = "SPACETIME_TIMEOUT_SECS", default_value_t = 10)]
    timeout_secs: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Ping,
    Identity(IdentityCommand),
    Db(DbCommand),
    /// Call a reducer with JSON arguments.
    Call {
        reducer: String,
        #[arg(long)]
        database_id: String,
        #[arg(long, default_value = "{}")]
        args: String,
    },
    /// Print raw text frames from a subscription.
    Subscribe {
        #[arg(long)]
        protocol: Option<String>,
        #[arg(long, help = "Stop after this many messages")]
        max_messages: Option<usize>,
    },
    /// Ping, create an identity, look up the database, and select from `person`.
    Demo,
}

#[derive(Args, Debug)]
struct IdentityCommand {
    #[command(subcommand)]
    command: IdentitySubcommand,
}

#[derive(Subcommand, Debug)]
enum IdentitySubcommand {
    Create,
    WsToken,
    PublicKey,
    Databases { identity: String },
    Verify { identity: String },
    RegisterEmail { email: String },
}

#[derive(Args, Debug)]
struct DbCommand {
    #[command(subcommand)]
    command: DbSubcommand,
}

#[derive(Subcommand, Debug)]
enum DbSubcommand {
    Info,
    Identity,
    Names,
    AddName {
        new_name: String,
    },
    Delete,
    Publish {
        #[arg(long)]
        wasm: PathBuf,
        #[arg(long, default_value_t = false)]
        anonymous: bool,
        #[arg(long, default_value_t = false)]
        clear: bool,
    },
    Logs {
        #[arg(long, default_value_t = 0)]
        num_lines: u32,
        #[arg(long, default_value_t = false)]
        follow: bool,
    },
    Sql {
        query: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = ClientConfig::new(&cli.base_url, &cli.db_name)?
        .with_request_timeout(Duration::from_secs(cli.timeout_secs));
    let client = Client::connect(config)?;

    let result = match cli.command {
        Command::Ping => run_ping(&client).await,
        Command::Identity(identity) => run_identity(&client, cli.token.as_deref(), identity).await,
        Command::Db(db) => run_db(&client, cli.token.as_deref(), db).await,
        Command::Call { reducer, database_id, args } => {
            let token = require_token(cli.token.as_deref())?;
            let args = parse_args_json(&args)?;
            client.call_reducer(&reducer, &database_id, token, &args).await?;
            println!("ok");
            Ok(())
        }
        Command::Subscribe { protocol, max_messages } => {
            run_subscribe(&client, cli.token.as_deref(), protocol.as_deref(), max_messages).await
        }
        Command::Demo => run_demo(&client).await,
    };

    client.disconnect();
    result
}

async fn run_ping(client: &Client) -> Result<(), CliError> {
    client.ping().await?;
    tracing::info!(base_url = client.http_base_url(), "server is healthy");
    println!("ok");
    Ok(())
}

async fn run_identity(client: &Client, token: Option<&str>, identity: IdentityCommand) -> Result<(), CliError> {
    match identity.command {
        IdentitySubcommand::Create => {
            let session = client.create_identity().await?;
            print_json(&serde_json::json!({ "identity": session.identity, "token": session.token }))
        }
        IdentitySubcommand::WsToken => {
            let (session, ws_token) = client.create_identity_websocket_token().await?;
            print_json(&serde_json::json!({
                "identity": session.identity,
                "token": session.token,
                "websocket_token": ws_token,
            }))
        }
        IdentitySubcommand::PublicKey => {
            print!("{}", client.get_public_key().await?);
            Ok(())
        }
        IdentitySubcommand::Databases { identity } => {
            let dbs = client.get_databases_by_identity(&identity).await?;
            print_json(&serde_json::json!(dbs))
        }
        IdentitySubcommand::Verify { identity } => {
            client.verify_identity_token(&identity, require_token(token)?).await?;
            println!("ok");
            Ok(())
        }
        IdentitySubcommand::RegisterEmail { email } => {
            let session = client.register_identity_with_email(&email).await?;
            print_json(&serde_json::json!({ "identity": session.identity, "token": session.token }))
        }
    }
}

async fn run_db(client: &Client, token: Option<&str>, db: DbCommand) -> Result<(), CliError> {
    let name = client.db_name();
    match db.command {
        DbSubcommand::Info => {
            let info = client.get_database_info(name).await?;
            print_json(&serde_json::json!({
                "database_identity": info.database_identity,
                "owner_identity": info.owner_identity,
                "host_kind": info.host_kind.as_str(),
                "initial_program": info.initial_program,
            }))
        }
        DbSubcommand::Identity => {
            println!("{}", client.get_database_identity(name).await?);
            Ok(())
        }
        DbSubcommand::Names => print_json(&serde_json::json!(client.get_database_names(name).await?)),
        DbSubcommand::AddName { new_name } => {
            client.add_database_name(name, &new_name, require_token(token)?).await?;
            println!("ok");
            Ok(())
        }
        DbSubcommand::Delete => {
            client.delete_database(name, require_token(token)?).await?;
            println!("ok");
            Ok(())
        }
        DbSubcommand::Publish { wasm, anonymous, clear } => {
            let token = require_token(token)?;
            let outcome = if anonymous {
                client.publish_database_file(&wasm, token).await?
            } else {
                client.publish_named_database_file(name, &wasm, token, clear).await?
            };
            print_json(&serde_json::json!({
                "database_identity": outcome.database_identity,
                "op": outcome.op.as_str(),
                "domain": outcome.domain,
            }))
        }
        DbSubcommand::Logs { num_lines, follow } => {
            let mut logs = client.get_database_logs(name, require_token(token)?, num_lines, follow).await?;
            while let Some(line) = logs.next_line().await? {
                println!("{line}");
            }
            Ok(())
        }
        DbSubcommand::Sql { query } => {
            let results = client.run_sql_query(&query, require_token(token)?, name).await?;
            print_sql(&results)
        }
    }
}

async fn run_subscribe(
    client: &Client,
    token: Option<&str>,
    protocol: Option<&str>,
    max_messages: Option<usize>,
) -> Result<(), CliError> {
    let mut sub = client.websocket_subscribe(client.db_name(), token, protocol).await?;
    eprintln!("subscribed: protocol={}", sub.protocol().unwrap_or("none"));

    let mut received = 0_usize;
    while let Some(text) = sub.next_text().await? {
        println!("{text}");
        received = received.saturating_add(1);
        if max_messages.is_some_and(|limit| received >= limit) {
            break;
        }
    }
    sub.close().await;
    Ok(())
}

async fn run_demo(client: &Client) -> Result<(), CliError> {
    client.ping().await?;
    eprintln!("successfully connected");

    let session = client.create_identity().await?;
    eprintln!("identity: {}", session.identity);

    let info = client.get_database_info(client.db_name()).await?;
    eprintln!("database identity: {}", info.database_identity);

    let results = client
        .run_sql_query("SELECT * FROM person;", &session.token, client.db_name())
        .await?;
    print_sql(&results)
}

fn require_token(token: Option<&str>) -> Result<&str, CliError> {
    token.filter(|t| !t.is_empty()).ok_or(CliError::MissingToken)
}

fn parse_args_json(raw: &str) -> Result<Value, CliError> {
    Ok(serde_json::from_str::<Value>(raw)?)
}

fn print_sql(results: &[spacetime_client::SqlResult]) -> Result<(), CliError> {
    for set in results {
        println!("schema: {}", serde_json::to_string(&set.schema)?);
        for row in &set.rows {
            println!("row: {}", serde_json::to_string(row)?);
        }
    }
    Ok(())
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}

#[cfg(test)]
#[path = "main_test.rs"]
mod tests;
