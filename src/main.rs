use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use pageflow_tester::config::RunConfig;
use pageflow_tester::data::DataStore;
use pageflow_tester::repository::ObjectRepository;

#[derive(Parser)]
#[command(name = "pageflow-tester")]
#[command(version = "0.1.0")]
#[command(about = "Page-object driven web acceptance testing engine", long_about = None)]
struct Cli {
    /// Path to the YAML configuration file
    #[arg(short, long, default_value = "./pageflow.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load the object repository and data sheets and report problems
    Validate,

    /// Print the raw locator expression for a page element
    Locator {
        /// Page name as registered in the object repository
        page: String,

        /// Element name on that page
        element: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let config = if cli.config.exists() {
        RunConfig::load(&cli.config)?
    } else {
        println!(
            "{} No config file at {}, using defaults",
            "!".yellow(),
            cli.config.display()
        );
        RunConfig::default()
    };

    match cli.command {
        Commands::Validate => validate(&config),
        Commands::Locator { page, element } => locator(&config, &page, &element),
    }
}

fn validate(config: &RunConfig) -> anyhow::Result<()> {
    let repository = ObjectRepository::load(&config.repository_dir)?;
    let pages = repository.page_names();
    println!(
        "{} Object repository: {} pages",
        "✓".green(),
        pages.len()
    );
    for page in &pages {
        let elements = repository.element_names(page);
        println!("    {} ({} elements)", page.white().bold(), elements.len());
        for element in elements {
            let expression = repository.raw_expression(page, element)?;
            if expression.trim().is_empty() {
                println!(
                    "      {} {} has an empty locator expression",
                    "✗".red(),
                    element
                );
            }
        }
    }

    if config.sheet_order.is_empty() {
        println!("{} No data sheets configured", "!".yellow());
    } else {
        let store = DataStore::load(&config.data_dir, &config.sheet_order)?;
        println!(
            "{} Test data: {} of {} configured sheets loaded",
            "✓".green(),
            store.sheet_count(),
            config.sheet_order.len()
        );
    }

    Ok(())
}

fn locator(config: &RunConfig, page: &str, element: &str) -> anyhow::Result<()> {
    let repository = ObjectRepository::load(&config.repository_dir)?;
    let descriptor = repository.locator(page, element)?;
    println!(
        "{}.{} -> {:?}: {}",
        page.white().bold(),
        element.white().bold(),
        descriptor.strategy,
        descriptor.expression
    );
    Ok(())
}
