// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! NeoRest command-line entry point

mod cli;

use clap::Parser;
use cli::{handle_console, handle_query, handle_version, Cli, Commands};
use colored::Colorize;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.level_filter())
        .format_timestamp_millis()
        .init();

    let result = match &cli.command {
        Commands::Version => handle_version(&cli).await,
        Commands::Query {
            query,
            params,
            format,
            graph,
            legacy,
        } => handle_query(&cli, query, params, *format, *graph, *legacy).await,
        Commands::Console { format } => handle_console(&cli, *format).await,
    };

    if let Err(e) = result {
        log::debug!("Command failed: {:?}", e);
        eprintln!("{}", format!("neorest: {}", e).red());
        std::process::exit(1);
    }
}
