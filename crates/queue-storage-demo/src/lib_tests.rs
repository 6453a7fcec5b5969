//! Tests for the queue-storage-demo library module.

use super::*;

#[test]
fn test_cli_parsing() {
    let cli = Cli::try_parse_from([
        "queue-storage-demo",
        "--connection-string",
        "UseDevelopmentStorage=true",
        "--json-logs",
        "--json",
        "basic",
    ])
    .unwrap();

    assert_eq!(cli.command, Commands::Basic);
    assert_eq!(
        cli.connection_string.as_deref(),
        Some("UseDevelopmentStorage=true")
    );
    assert!(cli.json_logs);
    assert!(cli.json);
    assert_eq!(cli.log_level, "info");
}

#[test]
fn test_subcommand_is_required() {
    let result = Cli::try_parse_from(["queue-storage-demo"]);
    assert!(result.is_err());
}

#[test]
fn test_completions_shell_parsing() {
    let cli = Cli::try_parse_from(["queue-storage-demo", "completions", "zsh"]).unwrap();

    assert_eq!(
        cli.command,
        Commands::Completions {
            shell: clap_complete::Shell::Zsh
        }
    );
}

#[tokio::test]
async fn test_completions_are_written() {
    let cli = Cli::try_parse_from(["queue-storage-demo", "completions", "bash"]).unwrap();
    let mut out = Vec::new();

    run(cli, &mut out).await.unwrap();

    let script = String::from_utf8(out).unwrap();
    assert!(script.contains("queue-storage-demo"));
}

/// Verify a malformed connection string stops the run before any sample starts
#[tokio::test]
async fn test_invalid_connection_string() {
    let cli = Cli::try_parse_from([
        "queue-storage-demo",
        "--connection-string",
        "AccountName=myaccount",
        "all",
    ])
    .unwrap();
    let mut out = Vec::new();

    let result = run(cli, &mut out).await;

    assert!(matches!(
        result.unwrap_err(),
        DemoError::Configuration(ConfigError::InvalidConnectionString(_))
    ));
    let output = String::from_utf8(out).unwrap();
    assert!(output.starts_with("Invalid storage account information provided."));
}

#[test]
fn test_write_exception_format() {
    let error = QueueStorageError::QueueNotFound {
        queue_name: "orders".to_string(),
    };
    let mut out = Vec::new();

    write_exception(&mut out, &error).unwrap();

    assert_eq!(
        String::from_utf8(out).unwrap(),
        "Exception thrown. service, msg = Queue not found: orders\n"
    );
}
