mod config;
mod document;
mod error;
mod extract;
mod lifecycle;
mod llm;
mod metrics;
mod session;
mod similarity;
mod table;

use clap::Parser;
use config::{Config, ScorerBackend};
use document::RawDocument;
use lifecycle::ModelLifecycle;
use llm::OllamaClient;
use session::Session;
use similarity::{LexicalScorer, OllamaEmbeddingScorer, TextSimilarityScorer};
use std::io::Write;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Ask questions about the financial metrics in a PDF or Excel document.
#[derive(Parser, Debug)]
#[command(name = "findoc_qa", version)]
struct Cli {
    /// PDF, XLS or XLSX file to analyse
    file: PathBuf,

    /// TOML config file (defaults to ./findoc_qa.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Question to ask; repeat for several. Without any, an interactive prompt starts.
    #[arg(short = 'q', long = "question")]
    questions: Vec<String>,

    /// Print detected metrics as JSON instead of a table
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // init tracing; stdout is reserved for the table and answers
    tracing_subscriber::fmt()
        .with_target(true)
        .with_level(true)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = Config::load_or_default(cli.config.as_deref())?;

    let doc = RawDocument::open(&cli.file)?;
    info!(file = %doc.name, bytes = doc.bytes.len(), kind = ?doc.kind, "File uploaded");
    println!("Uploaded: {}", doc.name);

    let client = OllamaClient::from_config(&cfg.ollama);
    let lifecycle = if cfg.ollama.stop_on_exit {
        ModelLifecycle::for_ollama(client.model())
    } else {
        ModelLifecycle::disabled()
    };

    let table = extract::extract_table(&doc);
    if table.is_empty() {
        eprintln!("Could not extract tables from this document.");
        warn!("File uploaded but no tables could be extracted");
        lifecycle.shutdown();
        return Ok(());
    }

    let scorer = build_scorer(&cfg, &client);
    let metrics = metrics::summarize(&table, scorer.as_ref(), cfg.matching.threshold).await;
    info!(metrics = metrics.len(), rows = table.len(), "Financial summary ready");

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&metrics)?);
    } else if metrics.is_empty() {
        println!("No standard financial metrics detected.");
    } else {
        println!("\nDetected Key Metrics\n");
        print!("{metrics}");
    }

    if !client.check_health().await {
        warn!(
            "Ollama is not reachable; answers will show an error. Start it with: ollama serve"
        );
    }

    let mut session = Session::new(metrics, client);
    if cli.questions.is_empty() {
        run_repl(&mut session).await?;
    } else {
        for question in &cli.questions {
            session.ask(question).await;
        }
        println!("\n{}", session.transcript());
    }

    lifecycle.shutdown();
    Ok(())
}

fn build_scorer(cfg: &Config, client: &OllamaClient) -> Box<dyn TextSimilarityScorer> {
    match cfg.matching.scorer {
        ScorerBackend::Lexical => Box::new(LexicalScorer),
        ScorerBackend::Ollama => {
            info!(model = %cfg.matching.embedding_model, "Using Ollama embeddings for metric matching");
            Box::new(OllamaEmbeddingScorer::new(
                client.clone(),
                &cfg.matching.embedding_model,
            ))
        }
    }
}

/// Line-oriented chat on stdin until EOF, `exit`/`quit`, or Ctrl-C.
async fn run_repl(session: &mut Session) -> std::io::Result<()> {
    println!("\nAsk about revenue, profit, expenses... (`exit` to quit)");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        };

        let Some(line) = line else {
            break;
        };
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if matches!(question, "exit" | "quit") {
            break;
        }

        println!("{}", session.ask(question).await);
    }

    info!(turns = session.history().len(), "Chat ended");
    Ok(())
}
