use std::path::PathBuf;
use std::process::ExitCode;

use chrono::Local;
use clap::{Args, Parser, Subcommand};
use sejm_scrap::request::{ApiClient, FetchOutcome};
use sejm_scrap::walk::{list_terms, proceedings_summary};
use sejm_scrap::{info_time, Result, Scraper, Settings};

const TITLE_PREVIEW: usize = 80;

#[derive(Parser)]
#[command(
    name = "sejm-scrap",
    about = "Downloads Sejm transcripts from api.sejm.gov.pl",
    args_conflicts_with_subcommands = true
)]
struct Cli {
    /// Debug-level logs
    #[arg(short, long, global = true)]
    verbose: bool,
    /// TOML file with default settings
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(flatten)]
    scrape: ScrapeArgs,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Download transcripts of a term (the default)
    Scrape(ScrapeArgs),
    /// List parliamentary terms
    Terms,
    /// List the proceedings of a term
    Summary {
        #[arg(short, long)]
        term: Option<u32>,
    },
}

#[derive(Args, Default)]
struct ScrapeArgs {
    #[arg(short, long)]
    term: Option<u32>,
    /// Only this proceeding number
    #[arg(short, long)]
    proceeding: Option<u32>,
    /// Skip the day PDFs
    #[arg(long)]
    no_pdfs: bool,
    /// Also download the HTML of every statement
    #[arg(long)]
    statements: bool,
    /// Download again even if the file exists
    #[arg(long)]
    force: bool,
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Pause between requests in milliseconds
    #[arg(long)]
    delay_ms: Option<u64>,
}

impl ScrapeArgs {
    fn apply(self, settings: &mut Settings) {
        if let Some(term) = self.term {
            settings.term = term;
        }
        if self.proceeding.is_some() {
            settings.proceeding = self.proceeding;
        }
        if self.no_pdfs {
            settings.fetch_pdfs = false;
        }
        if self.statements {
            settings.fetch_statements = true;
        }
        if self.force {
            settings.force = true;
        }
        if let Some(output) = self.output {
            settings.output_dir = output;
        }
        if let Some(delay) = self.delay_ms {
            settings.request_delay_ms = delay;
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logger(cli.verbose);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn init_logger(verbose: bool) {
    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    pretty_env_logger::formatted_timed_builder()
        .filter_level(level)
        .parse_default_env()
        .init();
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let mut settings = match &cli.config {
        Some(path) => Settings::from_toml_file(path)?,
        None => Settings::default(),
    };

    match cli.command.unwrap_or(Commands::Scrape(cli.scrape)) {
        Commands::Scrape(args) => {
            args.apply(&mut settings);
            scrape(settings).await
        }
        Commands::Terms => print_terms(&settings).await,
        Commands::Summary { term } => {
            if let Some(term) = term {
                settings.term = term;
            }
            print_summary(&settings).await
        }
    }
}

async fn scrape(settings: Settings) -> Result<ExitCode> {
    let start_time = Local::now();
    let stats = Scraper::from_settings(settings)?.run().await;
    let summary = stats.summary();

    println!("\n{summary}");
    info_time!(start_time, "Full program time:");

    Ok(if summary.has_errors {
        log::warn!("finished with {} errors, see the log above", stats.errors);
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

async fn print_terms(settings: &Settings) -> Result<ExitCode> {
    let mut api = ApiClient::from_settings(settings)?;
    let terms = match list_terms(&mut api).await {
        FetchOutcome::Fetched(terms) => terms,
        FetchOutcome::NotYetAvailable => Vec::new(),
        FetchOutcome::TransientError(e) | FetchOutcome::FatalError(e) => return Err(e),
    };

    println!("Terms of the Sejm:");
    for term in terms {
        let to = term.to.map_or_else(|| "ongoing".to_owned(), |d| d.to_string());
        let current = if term.current { " (current)" } else { "" };
        println!("  {:>2}: {} - {to}{current}", term.num, term.from);
    }
    Ok(ExitCode::SUCCESS)
}

async fn print_summary(settings: &Settings) -> Result<ExitCode> {
    let mut api = ApiClient::from_settings(settings)?;
    let today = Local::now().date_naive();
    let summary = match proceedings_summary(&mut api, settings.term, today).await {
        FetchOutcome::Fetched(summary) => summary,
        FetchOutcome::NotYetAvailable => Vec::new(),
        FetchOutcome::TransientError(e) | FetchOutcome::FatalError(e) => return Err(e),
    };

    println!("Proceedings of term {}:", settings.term);
    for p in summary {
        let dates = if p.dates.is_empty() {
            "no dates".to_owned()
        } else {
            p.dates
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        };
        let current = if p.current { " [current]" } else { "" };
        let future = if p.is_future { " [future]" } else { "" };
        println!("  {:>3}: {dates}{current}{future}", p.number);
        if !p.title.is_empty() {
            let title: String = p.title.chars().take(TITLE_PREVIEW).collect();
            let ellipsis = if p.title.chars().count() > TITLE_PREVIEW { "..." } else { "" };
            println!("       {title}{ellipsis}");
        }
    }
    Ok(ExitCode::SUCCESS)
}
