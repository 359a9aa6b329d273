use std::net::SocketAddr;

use anyhow::Context;
use clap::Parser;
use inquire::error::InquireResult;
use tracing_subscriber::EnvFilter;

mod app;
mod cli;
mod config;
mod highlights;
mod ingest;
mod search;
mod semantic;
mod storage;
#[cfg(test)]
mod tests;
mod web;

use app::{AppError, AppFactory, SearchRequest};
use cli::Command;

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = cli::Args::parse();
    init_logging(args.verbose);

    let paths = AppFactory::get_paths()?;
    let mut config = AppFactory::create_config(&paths)?;
    log::debug!("loaded configuration from {}", config.base_path());
    let service = AppFactory::create_service(&paths, &config)?;

    match args.command {
        Command::Serve { listen } => {
            if let Some(listen) = listen {
                listen
                    .parse::<SocketAddr>()
                    .with_context(|| format!("--listen is not a socket address: '{listen}'"))?;
                config.server.listen = listen;
            }

            web::start_daemon(service, config.server)?;
        }

        Command::Import { file } => {
            let data =
                std::fs::read(&file).with_context(|| format!("Failed to read {file}"))?;
            let count = service.import_csv(&file, &data)?;
            println!("Successfully stored {count} highlights");
        }

        Command::Search {
            prompt,
            limit,
            tags,
        } => {
            let request = SearchRequest {
                prompt,
                limit,
                tags: tags.as_deref().map(highlights::parse_tags),
            };

            match service.search(request) {
                Ok(results) => print_json(&results)?,
                Err(AppError::NotFound) => eprintln!("{}", AppError::NotFound),
                Err(err) => return Err(err.into()),
            }
        }

        Command::List { skip, limit } => {
            print_json(&service.list(skip, limit)?)?;
        }

        Command::Count => {
            println!("{}", service.count()?);
        }

        Command::Clear { yes } => {
            let count = service.count()?;
            if count == 0 {
                println!("Nothing to clear");
                return Ok(());
            }

            if !yes {
                match inquire::prompt_confirmation(format!(
                    "Delete all {count} highlights? (y/n)"
                )) {
                    InquireResult::Ok(true) => {}
                    InquireResult::Ok(false) => return Ok(()),
                    InquireResult::Err(err) => return Err(err.into()),
                }
            }

            service.clear()?;
            println!("All highlights cleared successfully");
        }
    }

    Ok(())
}
