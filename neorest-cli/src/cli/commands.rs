// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! CLI command definitions for NeoRest

use clap::{Parser, Subcommand, ValueEnum};
use serde_json::Value;

/// Log level options
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum LogLevel {
    /// Only errors
    Error,
    /// Warnings and errors
    Warn,
    /// Info, warnings, and errors
    Info,
    /// Debug messages and above (verbose)
    Debug,
    /// All messages including trace (very verbose)
    Trace,
    /// Disable all logging
    Off,
}

impl LogLevel {
    /// Convert to log::LevelFilter
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
            LogLevel::Off => log::LevelFilter::Off,
        }
    }
}

/// NeoRest CLI - Cypher over the Neo4j REST API
#[derive(Parser)]
#[command(name = "neorest")]
#[command(about = "NeoRest - run Cypher against a Neo4j server over its REST API")]
#[command(version)]
pub struct Cli {
    /// Server url (defaults to NEO4J_URL, then http://localhost:7474)
    #[arg(long, global = true)]
    pub url: Option<String>,

    /// Username for authentication
    #[arg(short = 'u', long = "user", global = true)]
    pub user: Option<String>,

    /// Password for authentication (if not provided, will be prompted)
    #[arg(short = 'p', long = "password", global = true)]
    pub password: Option<String>,

    /// Set log level (error, warn, info, debug, trace, off)
    #[arg(short = 'l', long = "log-level", global = true, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Verbose mode (equivalent to --log-level debug)
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Effective log level; `--log-level` wins over `--verbose`
    pub fn level_filter(&self) -> log::LevelFilter {
        match (self.log_level, self.verbose) {
            (Some(level), _) => level.to_level_filter(),
            (None, true) => log::LevelFilter::Debug,
            (None, false) => log::LevelFilter::Warn,
        }
    }
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Show client and server version information
    Version,

    /// Execute a Cypher query
    Query {
        /// The Cypher query to execute
        query: String,

        /// Query parameter as name=json (repeatable)
        #[arg(long = "param", value_parser = parse_param)]
        params: Vec<(String, Value)>,

        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,

        /// Return nodes and relationships in graph form
        #[arg(short, long)]
        graph: bool,

        /// Use the legacy cypher endpoint
        #[arg(long, conflicts_with = "graph")]
        legacy: bool,
    },

    /// Interactive Cypher console (REPL)
    Console {
        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },
}

/// Output format options
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
    Csv,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

/// Parses `name=value`; the value is read as JSON and falls back to a string
pub fn parse_param(s: &str) -> Result<(String, Value), String> {
    let (name, raw) = s
        .split_once('=')
        .ok_or_else(|| format!("Expected name=value, got '{}'", s))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("Parameter name missing in '{}'", s));
    }
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((name.to_string(), value))
}
