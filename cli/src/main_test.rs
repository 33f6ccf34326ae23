use super::*;
use clap::CommandFactory;

#[test]
fn cli_definition_is_consistent() {
    Cli::command().debug_assert();
}

#[test]
fn require_token_rejects_missing_and_empty() {
    assert!(matches!(require_token(None), Err(CliError::MissingToken)));
    assert!(matches!(require_token(Some("")), Err(CliError::MissingToken)));
    assert_eq!(require_token(Some("tok")).unwrap(), "tok");
}

#[test]
fn parse_args_json_reports_invalid_payload() {
    assert_eq!(parse_args_json(r#"["alice", 3]"#).unwrap(), serde_json::json!(["alice", 3]));
    assert!(matches!(parse_args_json("{not json"), Err(CliError::InvalidJson(_))));
}

#[test]
fn publish_flags_parse() {
    let cli = Cli::try_parse_from([
        "spacetime-cli",
        "--base-url",
        "http://db.local:3000",
        "db",
        "publish",
        "--wasm",
        "module.wasm",
        "--clear",
    ])
    .unwrap();
    assert_eq!(cli.base_url, "http://db.local:3000");
    match cli.command {
        Command::Db(DbCommand {
            command: DbSubcommand::Publish { wasm, anonymous, clear },
        }) => {
            assert_eq!(wasm, PathBuf::from("module.wasm"));
            assert!(!anonymous);
            assert!(clear);
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn call_defaults_to_empty_object_args() {
    let cli = Cli::try_parse_from(["spacetime-cli", "call", "send_message", "--database-id", "c200"]).unwrap();
    match cli.command {
        Command::Call { reducer, database_id, args } => {
            assert_eq!(reducer, "send_message");
            assert_eq!(database_id, "c200");
            assert_eq!(args, "{}");
        }
        other => panic!("unexpected command: {other:?}"),
    }
}
