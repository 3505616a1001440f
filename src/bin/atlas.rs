//! Terminal front-end for the technology index.
//!
//! One-shot subcommands print a single view (text by default, JSON with
//! `--json`); `browse` opens an interactive loop that walks category list →
//! technology cards → technology details. Logs go to stderr so stdout stays
//! clean for piping.

use anyhow::{Result, anyhow, bail};
use clap::{Parser, Subcommand};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use serde::Serialize;
use stackatlas::render::{category_list, category_page, implied_by_list, technology_detail};
use stackatlas::{
    CategoryKey, TechKey, TechnologyIndex, has_errors, load_index, resolve_data_location,
    validate_dataset,
};
use std::fmt::Display;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

/// Browse a technology taxonomy: categories, technologies, and implications.
#[derive(Parser)]
#[command(name = "atlas")]
#[command(version)]
#[command(about = "Browse a letter-partitioned technology taxonomy")]
#[command(propagate_version = true)]
struct Cli {
    /// Dataset directory or base URL (defaults to STACKATLAS_DATA, then a
    /// `technologies/` directory above the working directory)
    #[arg(long, global = true, value_name = "DIR|URL")]
    data: Option<String>,

    /// Emit JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List categories sorted by name, with technology counts
    Categories,
    /// Show technology cards for one category (key or name)
    Category { category: String },
    /// Show the full record of one technology
    Show { technology: String },
    /// List technologies whose `implies` points at the given key
    ImpliedBy { technology: String },
    /// Interactive category → technology → implication browser
    Browse,
    /// Check the dataset against the bundled schemas and cross-references
    Validate,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(err) = run(cli) {
        eprintln!("{err:#}");
        std::process::exit(1);
    }
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let data = cli.data.as_deref();
    match cli.command {
        Commands::Categories => {
            let index = load_index(data)?;
            emit(&category_list(&index), cli.json)
        }
        Commands::Category { category } => {
            let index = load_index(data)?;
            let key = resolve_category_key(&index, &category);
            emit(&category_page(&index, &key), cli.json)
        }
        Commands::Show { technology } => {
            let index = load_index(data)?;
            let key = TechKey(technology.trim().to_string());
            match technology_detail(&index, &key)? {
                Some(detail) => emit(&detail, cli.json),
                None => bail!("technology not found: {key}"),
            }
        }
        Commands::ImpliedBy { technology } => {
            let index = load_index(data)?;
            let key = TechKey(technology.trim().to_string());
            emit(&implied_by_list(&index, &key), cli.json)
        }
        Commands::Browse => {
            let index = load_index(data)?;
            browse(&index)
        }
        Commands::Validate => validate(data, cli.json),
    }
}

fn emit<T>(view: &T, json: bool) -> Result<()>
where
    T: Serialize + Display,
{
    if json {
        println!("{}", serde_json::to_string_pretty(view)?);
    } else {
        print!("{view}");
    }
    Ok(())
}

/// Category keys and names are both accepted; anything else is passed through
/// as a key so the page reports it as empty.
fn resolve_category_key(index: &TechnologyIndex, query: &str) -> CategoryKey {
    index
        .resolve_category(query)
        .map(|(key, _)| key.clone())
        .unwrap_or_else(|| CategoryKey(query.trim().to_string()))
}

fn validate(data: Option<&str>, json: bool) -> Result<()> {
    let location = resolve_data_location(data)?;
    let source = location.open()?;
    let findings = validate_dataset(source.as_ref())?;
    info!(findings = findings.len(), source = %source.describe(), "validation complete");

    if json {
        println!("{}", serde_json::to_string_pretty(&findings)?);
    } else if findings.is_empty() {
        println!("{}: no findings", source.describe());
    } else {
        for finding in &findings {
            println!("{finding}");
        }
    }

    if has_errors(&findings) {
        let errors = findings
            .iter()
            .filter(|finding| finding.severity == stackatlas::Severity::Error)
            .count();
        bail!("{errors} validation error(s) in {}", source.describe());
    }
    Ok(())
}

const BROWSE_HELP: &str = "\
Enter a category key or name to list its technologies.
Enter a technology key to show its full record.
  ..   back to the previous view
  ?    this help
  q    quit";

enum View {
    Categories,
    Category(CategoryKey),
}

fn browse(index: &TechnologyIndex) -> Result<()> {
    let mut editor =
        DefaultEditor::new().map_err(|err| anyhow!("starting line editor: {err}"))?;
    let mut stack = vec![View::Categories];
    print_view(index, &stack);

    loop {
        let prompt = match stack.last() {
            Some(View::Category(key)) => format!("atlas/{key}> "),
            _ => "atlas> ".to_string(),
        };
        let line = match editor.readline(&prompt) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(err) => bail!("reading input: {err}"),
        };
        let input = line.trim();
        if !input.is_empty() {
            let _ = editor.add_history_entry(input);
        }

        match input {
            "q" | "quit" | "exit" => break,
            "?" | "help" => println!("{BROWSE_HELP}"),
            "" => print_view(index, &stack),
            ".." => {
                if stack.len() > 1 {
                    stack.pop();
                }
                print_view(index, &stack);
            }
            query => {
                if let Some((key, _)) = index.resolve_category(query) {
                    stack.push(View::Category(key.clone()));
                    print_view(index, &stack);
                } else if let Some(detail) =
                    technology_detail(index, &TechKey(query.to_string()))?
                {
                    print!("{detail}");
                } else {
                    println!("No category or technology named '{query}'. Type ? for help.");
                }
            }
        }
    }
    Ok(())
}

fn print_view(index: &TechnologyIndex, stack: &[View]) {
    match stack.last() {
        Some(View::Category(key)) => print!("{}", category_page(index, key)),
        _ => print!("{}", category_list(index)),
    }
}
