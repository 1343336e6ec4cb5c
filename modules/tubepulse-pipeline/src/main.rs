use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use ai_client::Ollama;
use tubepulse_common::{ClassifierMode, Config};
use tubepulse_pipeline::export::{aggregate_row, bucket_rows, comment_rows};
use tubepulse_pipeline::{Analyzer, VideoAnalysis, VideoQuery};
use youtube_client::YoutubeClient;

#[derive(Parser)]
#[command(name = "tubepulse", about = "YouTube comment sentiment and topic analysis")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Comments to sample per video (overrides SAMPLE_SIZE)
    #[arg(long, global = true)]
    sample_size: Option<usize>,

    /// canonical or panel (overrides CLASSIFIER_MODE)
    #[arg(long, global = true)]
    mode: Option<ClassifierMode>,

    /// Only keep comments containing one of these words
    #[arg(long = "keyword", global = true)]
    keywords: Vec<String>,

    /// Leave this word out of top terms (adds to STOPWORDS)
    #[arg(long = "stopword", global = true)]
    stopwords: Vec<String>,

    /// Skip the natural-language summary
    #[arg(long, global = true)]
    no_summary: bool,

    /// Where reports are written
    #[arg(long, global = true, default_value = "out")]
    out_dir: PathBuf,
}

#[derive(Subcommand)]
enum Command {
    /// Analyse one video by URL, or the top results of a search
    Analyze {
        input: String,
        /// Treat the input as a search phrase even if it looks like a video id
        #[arg(long)]
        search: bool,
        #[arg(long, default_value_t = 1)]
        max_videos: usize,
        /// Language hint for search ranking (ISO 639-1)
        #[arg(long)]
        language: Option<String>,
    },
    /// Compare two videos head to head
    Battle {
        a: String,
        b: String,
        /// Treat both inputs as search phrases and take the top result of each
        #[arg(long)]
        search: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("tubepulse=info".parse()?))
        .init();

    let cli = Cli::parse();

    let mut config = Config::from_env()?;
    if let Some(sample_size) = cli.sample_size {
        config.sample_size = sample_size;
    }
    if let Some(mode) = cli.mode {
        config.classifier_mode = mode;
    }
    config
        .stopwords
        .extend(cli.stopwords.iter().map(|w| w.to_lowercase()));
    config.validate()?;
    config.log_redacted();

    let youtube = YoutubeClient::new(config.require_youtube_key()?.to_string())
        .with_timeout(Duration::from_secs(config.page_timeout_secs));

    let llm = connect_llm(&mut config, cli.no_summary).await;
    let mut analyzer = Analyzer::from_config(Arc::new(youtube), &config, llm, cli.keywords.clone())?;
    if cli.no_summary {
        analyzer = analyzer.without_summaries();
    }

    std::fs::create_dir_all(&cli.out_dir)
        .with_context(|| format!("creating {}", cli.out_dir.display()))?;

    match &cli.command {
        Command::Analyze {
            input,
            search,
            max_videos,
            language,
        } => {
            let query = to_query(input, *search, language.clone());
            let report = analyzer.analyze(&query, *max_videos).await?;
            for outcome in &report.outcomes {
                if let Some(analysis) = outcome.analysis() {
                    write_video(&cli.out_dir, analysis)?;
                }
            }
            write_json(&cli.out_dir.join("report.json"), &report)?;
            println!("{}", report.stats);
        }
        Command::Battle { a, b, search } => {
            let report = analyzer
                .battle(&to_query(a, *search, None), &to_query(b, *search, None))
                .await?;
            write_video(&cli.out_dir, &report.a)?;
            write_video(&cli.out_dir, &report.b)?;
            write_json(&cli.out_dir.join("battle.json"), &report)?;
            match report.verdict.winner() {
                Some(winner) => println!(
                    "Winner: {winner} ({:.3} vs {:.3})",
                    report.verdict.a.score, report.verdict.b.score
                ),
                None => println!("Tie ({:.3})", report.verdict.a.score),
            }
        }
    }

    info!(out_dir = %cli.out_dir.display(), "Reports written");
    Ok(())
}

fn to_query(input: &str, search: bool, language: Option<String>) -> VideoQuery {
    if search {
        VideoQuery::Search {
            phrase: input.to_string(),
            language,
        }
    } else {
        VideoQuery::infer(input, language)
    }
}

/// The model server, if reachable. An unreachable server disables summaries and
/// drops `llm` from the comparison panel.
async fn connect_llm(config: &mut Config, no_summary: bool) -> Option<Ollama> {
    let wants_panel_llm = config.classifier_mode == ClassifierMode::Panel
        && config.panel_models.iter().any(|m| m == "llm");
    if no_summary && !wants_panel_llm {
        return None;
    }

    let agent = Ollama::new(config.ollama_url.clone(), config.ollama_model.clone());
    match agent.check_connection().await {
        Ok(()) => Some(agent),
        Err(e) => {
            warn!(error = %e, url = %config.ollama_url, "Model server unavailable, continuing without it");
            config.panel_models.retain(|m| m != "llm");
            if config.panel_models.is_empty() {
                config.classifier_mode = ClassifierMode::Canonical;
            }
            None
        }
    }
}

fn write_video(dir: &Path, analysis: &VideoAnalysis) -> Result<()> {
    let id = &analysis.video.id;
    write_json(&dir.join(format!("{id}.comments.json")), &comment_rows(&analysis.comments))?;
    write_json(&dir.join(format!("{id}.trend.json")), &bucket_rows(&analysis.aggregate))?;
    write_json(&dir.join(format!("{id}.aggregate.json")), &aggregate_row(&analysis.aggregate))
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let file = std::fs::File::create(path).with_context(|| format!("creating {}", path.display()))?;
    serde_json::to_writer_pretty(std::io::BufWriter::new(file), value)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}
