//! cookbook-sync - command-line front end for the recipe book
//!
//! Every command loads the collection from the gateway, applies one action,
//! waits until all saves and uploads have settled, and reports the outcome.
//! A save or upload that ultimately failed makes the process exit non-zero.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use cookbook_common::config::ConfigResolver;
use cookbook_sync::http::{HttpGateway, HttpObjectStore};
use cookbook_sync::{
    BookOptions, RecipeBook, RecipePatch, SortDirection, SortKey, UploadFile, ViewState, Visibility,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Command-line arguments for cookbook-sync
#[derive(Parser, Debug)]
#[command(name = "cookbook-sync")]
#[command(about = "Manage a recipe collection stored behind a query gateway")]
#[command(version)]
struct Args {
    /// Gateway URL (overrides COOKBOOK_GATEWAY_URL and the config file)
    #[arg(long)]
    gateway: Option<String>,

    /// Config file path (overrides COOKBOOK_CONFIG)
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print recipes in display order
    List {
        #[arg(long, value_parser = parse_sort_key)]
        sort: Option<SortKey>,
        #[arg(long, value_parser = parse_direction)]
        direction: Option<SortDirection>,
        /// Only recipes created by the configured owner
        #[arg(long)]
        mine: bool,
    },
    /// Create a recipe
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        difficulty: Option<i64>,
        #[arg(long)]
        content: Option<String>,
    },
    /// Change fields of a recipe
    Edit {
        #[arg(long)]
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        difficulty: Option<i64>,
        #[arg(long)]
        content: Option<String>,
    },
    /// Delete a recipe
    Delete {
        #[arg(long)]
        id: String,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Upload an image for a recipe
    Upload {
        #[arg(long)]
        id: String,
        #[arg(long)]
        file: PathBuf,
    },
}

fn parse_sort_key(value: &str) -> std::result::Result<SortKey, String> {
    SortKey::parse(value).ok_or_else(|| format!("expected one of created, difficulty, name; got {}", value))
}

fn parse_direction(value: &str) -> std::result::Result<SortDirection, String> {
    SortDirection::parse(value).ok_or_else(|| format!("expected asc or desc; got {}", value))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = ConfigResolver::new()
        .with_gateway(args.gateway.clone())
        .with_config_path(args.config.clone())
        .resolve()
        .context("Failed to resolve configuration")?;

    // RUST_LOG wins over the configured level
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("Starting cookbook-sync v{}", env!("CARGO_PKG_VERSION"));

    let gateway_url = config
        .gateway_url
        .clone()
        .context("No gateway URL configured")?;
    info!("Gateway: {}", gateway_url);

    let gateway = Arc::new(HttpGateway::new(gateway_url, config.session_cookie.clone())?);
    let storage = Arc::new(HttpObjectStore::new()?);
    let mut book = RecipeBook::new(gateway.clone(), gateway, storage, BookOptions::from(&config));

    book.load();
    book.run_until_idle().await;
    if let Some(error) = book.status().last_load_error {
        bail!("Loading recipes failed: {}", error);
    }

    match args.command {
        Command::List {
            sort,
            direction,
            mine,
        } => {
            let defaults = ViewState::default();
            book.set_view(ViewState {
                sort: sort.unwrap_or(defaults.sort),
                direction: direction.unwrap_or(defaults.direction),
                visibility: if mine {
                    Visibility::OnlyMine
                } else {
                    Visibility::All
                },
            })?;
            print_recipes(&book);
        }
        Command::Create {
            name,
            difficulty,
            content,
        } => {
            let id = book.create_recipe()?;
            let patch = RecipePatch {
                name: Some(name),
                difficulty,
                content,
                image: None,
            };
            book.edit_recipe(&id, &patch)?;
            book.end_edit();
            println!("{}", id);
        }
        Command::Edit {
            id,
            name,
            difficulty,
            content,
        } => {
            book.begin_edit(&id)?;
            let patch = RecipePatch {
                name,
                difficulty,
                content,
                image: None,
            };
            book.edit_recipe(&id, &patch)?;
            book.end_edit();
        }
        Command::Delete { id, yes } => {
            book.request_delete(&id);
            if yes || confirm(&format!("Delete recipe {}?", id))? {
                match book.confirm_delete() {
                    Some(recipe) => println!("Deleted {} ({})", recipe.id, recipe.name),
                    None => println!("No recipe {}", id),
                }
            } else {
                book.cancel_delete();
                println!("Cancelled");
            }
        }
        Command::Upload { id, file } => {
            let file = UploadFile::from_path(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let job = book.upload_image(&id, file)?;
            info!(job_id = %job, "Upload queued");
        }
    }

    book.run_until_idle().await;

    let status = book.status();
    if let Some(error) = status.last_upload_error {
        bail!("Upload failed: {}", error);
    }
    if let Some(error) = status.last_save_error {
        bail!("Saving recipes failed: {}", error);
    }
    Ok(())
}

fn print_recipes(book: &RecipeBook) {
    for recipe in book.display() {
        let name = if recipe.name.is_empty() {
            "(untitled)"
        } else {
            recipe.name.as_str()
        };
        println!(
            "{}  {:<32} difficulty {}  {}  {}",
            recipe.id,
            name,
            recipe.difficulty,
            recipe.created.format("%Y-%m-%d"),
            recipe.image.as_deref().unwrap_or("-"),
        );
    }
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{} [y/N] ", prompt);
    std::io::stdout().flush()?;

    let mut answer = String::new();
    std::io::stdin().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}
