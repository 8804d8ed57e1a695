use std::process::ExitCode;

use axum::extract::Request;
use axum::response::{IntoResponse, Response};
use clap::{Parser, Subcommand};

use xprsso::query::descriptor::parse_descriptors;
use xprsso::query::escape::{decode, encode};
use xprsso::query::normalize::{extract_path_identifiers, load_source, normalize};
use xprsso::observability::logging;
use xprsso::registry::Registry;
use xprsso::router::App;
use xprsso::{Next, SharedContext, Task, Xprsso};

#[derive(Parser)]
#[command(name = "xprsso-cli")]
#[command(about = "Inspect and check xprsso route queries", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Escape route characters into schema-safe tokens
    Encode { text: String },
    /// Turn tokens back into route characters
    Decode { text: String },
    /// List the @descriptors of a query
    Descriptors {
        /// Query text or path to a query file
        query: String,
    },
    /// Print the schema a query is validated against
    Schema {
        /// Task names to register before synthesizing
        #[arg(short, long = "task")]
        tasks: Vec<String>,
        query: String,
    },
    /// Run the full pipeline against a scratch application
    Check {
        #[arg(short, long = "task")]
        tasks: Vec<String>,
        query: String,
    },
}

async fn noop(_ctx: SharedContext, _req: Request, _next: Next) -> Response {
    ().into_response()
}

fn instance(tasks: &[String]) -> xprsso::Result<Xprsso> {
    let mut xprsso = Xprsso::new();
    for task in tasks {
        xprsso.add_named_task(task, noop)?;
    }
    Ok(xprsso)
}

fn run(command: Commands) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::Encode { text } => println!("{}", encode(&text)),
        Commands::Decode { text } => println!("{}", decode(&text)),
        Commands::Descriptors { query } => {
            let raw = load_source(&query)?;
            let descriptors = parse_descriptors(&raw)?;
            println!("{}", serde_json::to_string_pretty(&descriptors)?);
        }
        Commands::Schema { tasks, query } => {
            let safe = normalize(&load_source(&query)?)?;
            let mut registry = Registry::new();
            for task in &tasks {
                registry.register_task(Task::new(task.as_str(), noop)?)?;
            }
            for identifier in extract_path_identifiers(&safe)? {
                registry.register_path(&identifier)?;
            }
            print!("{}", xprsso::schema::Schema::synthesize(&registry));
        }
        Commands::Check { tasks, query } => {
            let mut xprsso = instance(&tasks)?;
            let mut app = App::new();
            xprsso.set(&mut app, &query)?;
            for route in app.describe() {
                println!("{}", route);
            }
            println!("ok: {} route(s)", app.route_count());
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init("error");
    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
