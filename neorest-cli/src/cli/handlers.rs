// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! CLI command handlers for NeoRest

use colored::Colorize;
use neorest::{Client, ClientConfig, Cursor, Query, ResultContent, Transaction};
use rustyline::{error::ReadlineError, CompletionType, Config, EditMode, Editor};
use serde_json::{Map, Value};
use std::path::Path;

use super::commands::{Cli, OutputFormat};
use super::output::ResultFormatter;

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Builds the client configuration from flags, falling back to the environment
fn client_config(cli: &Cli) -> CliResult<ClientConfig> {
    let mut config = ClientConfig::from_env();
    if let Some(url) = &cli.url {
        config.url = url.clone();
    }

    if let Some(user) = &cli.user {
        let password = match &cli.password {
            Some(password) => password.clone(),
            None => {
                print!("Password: ");
                std::io::Write::flush(&mut std::io::stdout())?;
                rpassword::read_password()?
            }
        };
        config = config.with_credentials(user.clone(), password);
    }
    Ok(config)
}

async fn connect(cli: &Cli) -> CliResult<Client> {
    let config = client_config(cli)?;
    Ok(Client::connect(config).await?)
}

async fn render(cursor: &Cursor, format: OutputFormat) -> CliResult<String> {
    let rows = cursor.fetch(false).await?;
    Ok(ResultFormatter::format(&rows, format))
}

/// Handle the version command
pub async fn handle_version(cli: &Cli) -> CliResult<()> {
    println!("{} {}", "neorest".bold().green(), env!("CARGO_PKG_VERSION"));

    match connect(cli).await {
        Ok(client) => {
            println!("Server:  {}", client.root().cyan());
            println!("Neo4j:   {}", client.version().unwrap_or("unknown").cyan());
        }
        Err(e) => println!("{}", format!("Server unreachable: {}", e).yellow()),
    }
    Ok(())
}

/// Handle the query command (one-off query execution)
pub async fn handle_query(
    cli: &Cli,
    query: &str,
    params: &[(String, Value)],
    format: OutputFormat,
    graph: bool,
    legacy: bool,
) -> CliResult<()> {
    let client = connect(cli).await?;

    let parameters: Map<String, Value> = params.iter().cloned().collect();
    let mut query = Query::new(query).params(parameters);
    if graph {
        query = query.contents([ResultContent::Graph]);
    }

    let result = if legacy {
        client.cypher(query).await
    } else {
        client.query(query).await
    };

    match result {
        Ok(cursor) => {
            println!("{}", render(&cursor, format).await?);
            Ok(())
        }
        Err(e) => {
            eprintln!("{}", format!("Error: {}", e).red());
            Err(e.into())
        }
    }
}

/// Handle the console (REPL) command
pub async fn handle_console(cli: &Cli, format: OutputFormat) -> CliResult<()> {
    let client = connect(cli).await?;

    println!("{}", "NeoRest".bold().green());
    println!("Type 'help' for commands, 'exit' or 'quit' to exit");
    println!("Multi-line queries supported - use ';' to terminate");
    println!(
        "{}",
        format!(
            "Connected to {} (Neo4j {})",
            client.root(),
            client.version().unwrap_or("unknown")
        )
        .cyan()
    );

    let config = Config::builder()
        .edit_mode(EditMode::Emacs)
        .history_ignore_space(true)
        .completion_type(CompletionType::List)
        .auto_add_history(false)
        .build();

    let mut rl = Editor::<(), _>::with_config(config)?;

    let history_path = ".neorest/.cypher_history.txt";
    if let Some(parent) = Path::new(&history_path).parent() {
        std::fs::create_dir_all(parent)?;
    }
    let _ = rl.load_history(&history_path);

    let mut query_buffer = String::new();
    let mut transaction: Option<Transaction> = None;

    loop {
        let marker = if transaction.is_some() { "tx" } else { "cypher" };
        let prompt = if query_buffer.is_empty() {
            format!("{}> ", marker.cyan())
        } else {
            format!("{}...> ", marker.cyan())
        };

        let line = match rl.readline(&prompt) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => {
                if !query_buffer.is_empty() {
                    query_buffer.clear();
                    println!("{}", "\nQuery buffer cleared".yellow());
                }
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("{}", "Goodbye!".green());
                break;
            }
            Err(err) => {
                eprintln!("{}", format!("Error: {:?}", err).red());
                break;
            }
        };

        let trimmed = line.trim();

        if query_buffer.is_empty() {
            match trimmed.to_lowercase().as_str() {
                "exit" | "quit" => {
                    println!("{}", "Goodbye!".green());
                    break;
                }
                "help" => {
                    print_help();
                    continue;
                }
                "clear" => {
                    print!("\x1B[2J\x1B[1;1H");
                    std::io::Write::flush(&mut std::io::stdout())?;
                    continue;
                }
                "labels" => {
                    report(client.labels().await.map(|labels| labels.join(", ")));
                    continue;
                }
                "types" => {
                    report(client.relationship_types().await.map(|types| types.join(", ")));
                    continue;
                }
                "begin" => {
                    if transaction.is_some() {
                        println!("{}", "A transaction is already open".yellow());
                    } else {
                        match client.transaction(None) {
                            Ok(tx) => {
                                transaction = Some(tx);
                                println!("{}", "Transaction opened".green());
                            }
                            Err(e) => eprintln!("{}", format!("Error: {}", e).red()),
                        }
                    }
                    continue;
                }
                "commit" => {
                    match transaction.take() {
                        Some(tx) => report(tx.commit(None).await.map(|results| {
                            format!("Committed ({} result set(s))", results.len())
                        })),
                        None => println!("{}", "No open transaction".yellow()),
                    }
                    continue;
                }
                "rollback" => {
                    match transaction.take() {
                        Some(tx) => report(tx.rollback().await.map(|_| "Rolled back".to_string())),
                        None => println!("{}", "No open transaction".yellow()),
                    }
                    continue;
                }
                "" => continue,
                _ => {}
            }
        }

        query_buffer.push_str(&line);
        query_buffer.push('\n');

        if trimmed.ends_with(';') {
            let statement = query_buffer.trim().trim_end_matches(';').trim().to_string();
            rl.add_history_entry(query_buffer.trim())?;
            query_buffer.clear();

            let result = match &transaction {
                Some(tx) => tx.execute(statement.as_str()).await,
                None => client.query(statement.as_str()).await,
            };
            match result {
                Ok(cursor) => match render(&cursor, format).await {
                    Ok(output) => println!("{}", output),
                    Err(e) => eprintln!("{}", format!("Error: {}", e).red()),
                },
                Err(e) => eprintln!("{}", format!("Error: {}", e).red()),
            }
        }
    }

    if let Some(tx) = transaction {
        println!("{}", "Rolling back the open transaction".yellow());
        let _ = tx.rollback().await;
    }
    let _ = rl.save_history(&history_path);

    Ok(())
}

fn report(result: neorest::Result<String>) {
    match result {
        Ok(message) => println!("{}", message),
        Err(e) => eprintln!("{}", format!("Error: {}", e).red()),
    }
}

/// Print help message
fn print_help() {
    println!("{}", "Available commands:".bold().green());
    println!("  {}  - Show this help message", "help".cyan());
    println!("  {}  - Exit the console", "exit/quit".cyan());
    println!("  {}  - Clear the screen", "clear".cyan());
    println!("  {}  - List labels in use", "labels".cyan());
    println!("  {}  - List relationship types in use", "types".cyan());
    println!("\n{}", "Transactions:".bold().green());
    println!("  {}  - Open a transaction; statements run inside it", "begin".cyan());
    println!("  {}  - Commit the open transaction", "commit".cyan());
    println!("  {}  - Roll back the open transaction", "rollback".cyan());
    println!("\n{}", "Query syntax:".bold().green());
    println!("  Multi-line queries are supported");
    println!("  Terminate queries with semicolon (;)");
    println!("\n{}", "Cypher examples:".bold().green());
    println!("  {}", "MATCH (n:Person) RETURN n LIMIT 10;".yellow());
    println!("  {}", "CREATE (p:Person {{name: 'Alice'}}) RETURN p;".yellow());
}
