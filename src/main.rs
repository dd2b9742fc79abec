mod align;
mod config;
mod features;
mod frame;
mod loader;
mod models;
mod pipeline;
mod sentiment;
mod sources;
mod storage;
mod utils;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::AppConfig;
use crate::frame::JoinKind;
use crate::loader::load_table;
use crate::pipeline::assemble::MergeOptions;
use crate::pipeline::report::{correlations, summarize};
use crate::pipeline::{Pipeline, StageStats};
use crate::sentiment::ScorerKind;
use crate::utils::{fmt_count, fmt_opt};

#[derive(Parser)]
#[command(
    name = "aapl-sentiment",
    about = "Daily sentiment and indicator alignment for AAPL direction modelling",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum RecordSource {
    News,
    Reddit,
}

#[derive(Subcommand)]
enum Command {
    /// Download the configured FRED series (native frequency)
    FetchIndicators,

    /// Download daily bars for the configured symbol
    FetchPrices,

    /// Search news, scrape credible articles and score them
    FetchNews {
        /// Override `sentiment.strategy`
        #[arg(long, value_enum)]
        scorer: Option<ScorerKind>,
    },

    /// Search the configured subreddits and score each post
    FetchReddit {
        #[arg(long, value_enum)]
        scorer: Option<ScorerKind>,
    },

    /// Reindex raw indicators to daily, impute gaps, scale and flag
    Impute {
        /// Raw indicator table (default: <data_dir>/indicators_raw.csv)
        #[arg(long)]
        input: Option<PathBuf>,

        /// Price file whose close joins the table (default: <data_dir>/prices.jsonl)
        #[arg(long)]
        prices: Option<PathBuf>,

        /// Leave the equity close out
        #[arg(long)]
        no_prices: bool,

        #[arg(long, default_value = storage::INDICATORS_DAILY)]
        output: String,
    },

    /// Aggregate scored records into one mean score per day
    Daily {
        #[arg(long, value_enum, default_value = "news")]
        source: RecordSource,

        /// Record file (default depends on --source)
        #[arg(long)]
        input: Option<PathBuf>,

        /// Score column name (default: news_score / reddit_score)
        #[arg(long)]
        column: Option<String>,

        #[arg(long)]
        output: Option<String>,
    },

    /// Fit one scorer's output onto another's scale
    Calibrate {
        /// Records scored by the reference strategy
        #[arg(long)]
        reference: PathBuf,

        /// Records to calibrate
        #[arg(long)]
        target: PathBuf,

        #[arg(long)]
        output: PathBuf,
    },

    /// Join price features with daily tables into the model dataset
    Merge {
        #[arg(long)]
        prices: Option<PathBuf>,

        /// Daily tables to join (default: indicators, news and reddit daily files)
        #[arg(long = "input")]
        inputs: Vec<PathBuf>,

        #[arg(long, value_enum, default_value_t = JoinKind::Inner)]
        how: JoinKind,

        /// Forward/backward fill every column except the label
        #[arg(long)]
        fill: bool,

        /// Drop rows where any price feature is still empty
        #[arg(long)]
        dropna: bool,

        /// Prefix each input's columns with its file stem
        #[arg(long)]
        prefix: bool,
    },

    /// List calendar days absent from a table
    Gaps { file: PathBuf },

    /// Row count, date span and empty cells per column
    Inspect { file: PathBuf },

    /// Correlation of every column with a target column
    Correlate {
        file: PathBuf,

        #[arg(long, default_value = features::TARGET_COLUMN)]
        target: String,
    },
}

fn report(stats: &StageStats) {
    info!(
        "Done: {} rows → {:?} ({} errors)",
        fmt_count(stats.rows_written),
        stats.output,
        stats.errors
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "aapl_sentiment=info,warn",
        1 => "aapl_sentiment=debug,info",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().compact().with_target(false))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    let config = AppConfig::load()?;
    let pipeline = Pipeline::new(config);

    match cli.command {
        Command::FetchIndicators => {
            let _t = utils::Timer::start("FRED indicators");
            report(&pipeline.fetch_indicators().await?);
        }

        Command::FetchPrices => {
            let _t = utils::Timer::start("Daily prices");
            report(&pipeline.fetch_prices().await?);
        }

        Command::FetchNews { scorer } => {
            let _t = utils::Timer::start("News sentiment");
            report(&pipeline.fetch_news(scorer).await?);
        }

        Command::FetchReddit { scorer } => {
            let _t = utils::Timer::start("Reddit sentiment");
            report(&pipeline.fetch_reddit(scorer).await?);
        }

        Command::Impute {
            input,
            prices,
            no_prices,
            output,
        } => {
            let _t = utils::Timer::start("Imputation");
            let input = input.unwrap_or_else(|| pipeline.data_path(storage::INDICATORS_RAW));
            let prices = (!no_prices)
                .then(|| prices.unwrap_or_else(|| pipeline.data_path(storage::PRICES)));
            report(&pipeline.impute(&input, prices.as_deref(), &output)?);
        }

        Command::Daily {
            source,
            input,
            column,
            output,
        } => {
            let _t = utils::Timer::start("Daily aggregation");
            let (records, default_column, default_output) = match source {
                RecordSource::News => (storage::NEWS_SENTIMENT, "news_score", storage::NEWS_DAILY),
                RecordSource::Reddit => (storage::REDDIT_POSTS, "reddit_score", storage::REDDIT_DAILY),
            };
            let input = input.unwrap_or_else(|| pipeline.data_path(records));
            let column = column.unwrap_or_else(|| default_column.to_string());
            let output = output.unwrap_or_else(|| default_output.to_string());
            report(&pipeline.daily(&input, &column, &output)?);
        }

        Command::Calibrate {
            reference,
            target,
            output,
        } => {
            let cal = pipeline.calibrate(&reference, &target, &output)?;
            println!("slope      : {:.6}", cal.slope);
            println!("intercept  : {:.6}", cal.intercept);
            println!("pairs      : {}", fmt_count(cal.pairs));
            println!("written to : {}", output.display());
        }

        Command::Merge {
            prices,
            inputs,
            how,
            fill,
            dropna,
            prefix,
        } => {
            let _t = utils::Timer::start("Merge");
            let prices = prices.unwrap_or_else(|| pipeline.data_path(storage::PRICES));
            let inputs = if inputs.is_empty() {
                [storage::INDICATORS_DAILY, storage::NEWS_DAILY, storage::REDDIT_DAILY]
                    .iter()
                    .map(|f| pipeline.data_path(f))
                    .collect()
            } else {
                inputs
            };
            report(&pipeline.merge(&prices, &inputs, MergeOptions {
                how,
                fill,
                drop_incomplete: dropna,
                prefix,
            })?);
        }

        Command::Gaps { file } => {
            let table = load_table(&file)?;
            let gaps = summarize(&table).calendar_gaps;
            if gaps.is_empty() {
                println!("No missing dates in {}", file.display());
            } else {
                println!("{} missing dates:", fmt_count(gaps.len()));
                for d in &gaps {
                    println!("  {}", d);
                }
            }
        }

        Command::Inspect { file } => {
            let s = summarize(&load_table(&file)?);
            println!("─────────────────────────────────");
            println!("  {}", file.display());
            println!("─────────────────────────────────");
            println!("  Rows     : {}", fmt_count(s.rows));
            println!("  From     : {}", s.first.map(|d| d.to_string()).unwrap_or("—".into()));
            println!("  To       : {}", s.last.map(|d| d.to_string()).unwrap_or("—".into()));
            println!("  Gaps     : {}", fmt_count(s.calendar_gaps.len()));
            println!("  Empty cells per column:");
            for (name, n) in &s.missing {
                println!("    {:<32} {}", name, fmt_count(*n));
            }
            println!("─────────────────────────────────");
        }

        Command::Correlate { file, target } => {
            let table = load_table(&file)?;
            let corr = correlations(&table, &target)?;
            println!("Correlation with {:?}:", target);
            for (name, r) in &corr {
                println!("  {:<32} {:>8}", name, fmt_opt(Some(*r), 4));
            }
        }
    }

    Ok(())
}
