//! Document QA Benchmark CLI

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use docqa_benchmark::{
    config::{Config, ConfigError},
    fetch::{DocumentSource, HttpFetcher},
    providers::create_registry,
    records::{group_by_link, load_records_from_file, GroupingMode, MAX_GROUP_MEMBERS},
    reporting::{print_console_report, write_table, JsonSummary},
    runner::{CheckpointProgress, ConsoleProgress, Evaluator, ProgressCallback},
};

#[derive(Parser)]
#[command(name = "docqa-benchmark")]
#[command(about = "Score LLM answers to questions about linked documents")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (TOML, or JSON with a .json extension)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate every record against every configured LLM and style
    Run {
        /// Input CSV with Term, Questions, Link and AnswerKey columns
        #[arg(short, long)]
        input: PathBuf,

        /// Output CSV path
        #[arg(short, long, default_value = "evaluation_results.csv")]
        output: PathBuf,

        /// Batch up to 5 records sharing a link into one call
        #[arg(long, conflicts_with = "per_row")]
        group_by_link: bool,

        /// One call per record (skips the interactive question)
        #[arg(long)]
        per_row: bool,

        /// Comma-separated LLM labels (default: all configured)
        #[arg(long)]
        llms: Option<String>,

        /// Comma-separated instruction styles (default: all configured)
        #[arg(long)]
        styles: Option<String>,

        /// Also write a JSON summary to this path
        #[arg(long)]
        summary: Option<PathBuf>,

        /// Rewrite the output table after every record or group
        #[arg(long)]
        checkpoint: bool,
    },

    /// Fetch one URL and show what would be sent as context
    Fetch {
        #[arg(short, long)]
        url: String,
    },

    /// List records from an input table
    ListRecords {
        #[arg(short, long)]
        input: PathBuf,

        /// Show link groups instead of individual records
        #[arg(long)]
        group_by_link: bool,
    },

    /// Generate sample configuration
    InitConfig {
        /// Output path for configuration file
        #[arg(short, long, default_value = "config/eval.toml")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("docqa_benchmark=debug,info")
    } else {
        EnvFilter::new("docqa_benchmark=info,warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .init();

    match cli.command {
        Commands::Run {
            input,
            output,
            group_by_link,
            per_row,
            llms,
            styles,
            summary,
            checkpoint,
        } => {
            let mode = if group_by_link {
                GroupingMode::ByLink
            } else if per_row {
                GroupingMode::PerRow
            } else {
                ask_grouping_mode()?
            };
            let config = load_config(cli.config.as_deref())?;
            run_evaluation(config, input, output, mode, llms, styles, summary, checkpoint).await?;
        }

        Commands::Fetch { url } => {
            let config = load_config(cli.config.as_deref())?;
            fetch_preview(&config, &url).await?;
        }

        Commands::ListRecords {
            input,
            group_by_link,
        } => {
            list_records(input, group_by_link)?;
        }

        Commands::InitConfig { output } => {
            init_config(output)?;
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    match path {
        Some(path) => Config::from_file(path),
        None => Ok(Config::load_or_default()),
    }
}

fn split_list(arg: Option<String>) -> Option<Vec<String>> {
    arg.map(|s| {
        s.split(',')
            .map(|item| item.trim().to_string())
            .filter(|item| !item.is_empty())
            .collect()
    })
}

/// Ask on stdin until the answer is y or n
fn ask_grouping_mode() -> std::io::Result<GroupingMode> {
    let stdin = std::io::stdin();
    loop {
        print!("Do you want to group up to 5 questions together per Link? (y/n) ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "no answer given for grouping mode",
            ));
        }
        match line.trim().to_lowercase().as_str() {
            "y" => return Ok(GroupingMode::ByLink),
            "n" => return Ok(GroupingMode::PerRow),
            _ => println!("Please answer 'y' or 'n'."),
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_evaluation(
    mut config: Config,
    input: PathBuf,
    output: PathBuf,
    mode: GroupingMode,
    llms_arg: Option<String>,
    styles_arg: Option<String>,
    summary_path: Option<PathBuf>,
    checkpoint: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let run_id = Utc::now().format("%Y%m%d-%H%M%S").to_string();

    if let Some(llms) = split_list(llms_arg) {
        config.evaluation.llms = llms;
    }
    if let Some(styles) = split_list(styles_arg) {
        config.evaluation.styles = styles;
    }
    let plan = config.plan()?;

    println!("=== Document QA Benchmark ===");
    println!("Run ID: {}", run_id);
    println!("Mode:   {:?}", mode);
    println!(
        "LLMs:   {}",
        plan.llms.iter().map(|l| l.label.as_str()).collect::<Vec<_>>().join(", ")
    );
    println!(
        "Styles: {}",
        plan.styles.iter().map(|s| s.name.as_str()).collect::<Vec<_>>().join(", ")
    );

    let records = load_records_from_file(&input)?;
    println!("Records: {}", records.len());
    println!();

    let registry = create_registry(&plan)?;
    let fetcher = HttpFetcher::new(&plan.fetch)?;

    let mut progress: Arc<dyn ProgressCallback> = Arc::new(ConsoleProgress);
    if checkpoint {
        progress = Arc::new(CheckpointProgress::new(&output, progress));
    }

    let evaluator = Evaluator::new(plan, Arc::new(fetcher), registry)?.with_progress(progress);

    println!("Running evaluation...");
    let table = evaluator.run(&records, mode).await;

    write_table(&output, &table)?;
    tracing::info!("Results written to {}", output.display());

    let summary = JsonSummary::from_table(&run_id, &table, mode, output.display().to_string());
    if let Some(path) = summary_path {
        summary.write_to_file(&path)?;
        println!("Summary written to {}", path.display());
    }
    print_console_report(&summary);

    Ok(())
}

async fn fetch_preview(config: &Config, url: &str) -> Result<(), Box<dyn std::error::Error>> {
    let fetcher = HttpFetcher::new(&config.fetch)?;

    match fetcher.fetch(url).await? {
        Some(document) => {
            let preview: String = document.text.chars().take(200).collect();
            println!("Format: {}", document.format);
            println!("Length: {} chars", document.text.chars().count());
            println!("{:-<60}", "");
            println!("{}", preview);
        }
        None => println!("No document found at {}", url),
    }

    Ok(())
}

fn list_records(input: PathBuf, grouped: bool) -> Result<(), Box<dyn std::error::Error>> {
    let records = load_records_from_file(&input)?;

    if grouped {
        let groups = group_by_link(&records, MAX_GROUP_MEMBERS);
        println!("Link Groups ({}):", groups.len());
        println!("{:-<60}", "");
        for group in &groups {
            let rows: Vec<String> = group.members.iter().map(|r| r.index.to_string()).collect();
            println!(
                "  {} | rows {} | {} question(s)",
                group.link,
                rows.join(","),
                group.flattened_questions().len()
            );
        }
    } else {
        println!("Records ({}):", records.len());
        println!("{:-<60}", "");
        for record in &records {
            println!(
                "  {} | {} | {} question(s) | {}",
                record.index,
                record.term,
                record.question_count(),
                record.link
            );
        }
    }

    Ok(())
}

fn init_config(output: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::default();

    // Ensure parent directory exists
    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)?;
    }

    config.save_toml(&output)?;
    println!("Configuration written to: {}", output.display());
    Ok(())
}
