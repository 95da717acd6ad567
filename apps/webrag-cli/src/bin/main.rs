use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::{env, fs};

use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};

use webrag_cli::{build_orchestrator, init_tracing};
use webrag_core::config::Config;
use webrag_core::traits::TextFetcher;
use webrag_core::Error;
use webrag_rag::{HttpFetcher, RetrievalOrchestrator};

const USAGE: &str = "\
Usage:
  webrag ingest-dir <dir> [--no-llm] [question]
  webrag url <url> [--no-llm] <question>

Without a question, ingest-dir reads questions from stdin, one per line.
--no-llm prints the retrieved context instead of asking the model.";

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let mut args: Vec<String> = env::args().skip(1).collect();
    let no_llm = take_flag(&mut args, "--no-llm");
    let Some(command) = args.first().cloned() else {
        println!("{USAGE}");
        return Ok(());
    };

    let config = Config::load().map_err(|e| { eprintln!("Error loading config: {e}"); e })?;
    let settings = config.settings()?;
    let orchestrator = build_orchestrator(&settings)?;

    match command.as_str() {
        "ingest-dir" => {
            let dir = args.get(1).map(PathBuf::from).context("ingest-dir requires a directory")?;
            let chunks = ingest_dir(&orchestrator, &dir)?;
            println!("Indexed {chunks} chunks from {}", dir.display());
            if args.len() > 2 {
                ask(&orchestrator, &args[2..].join(" "), no_llm).await?;
            } else {
                let stdin = io::stdin();
                prompt()?;
                for line in stdin.lock().lines() {
                    let line = line?;
                    if !line.trim().is_empty() {
                        ask(&orchestrator, &line, no_llm).await?;
                    }
                    prompt()?;
                }
            }
        }
        "url" => {
            if args.len() < 3 {
                bail!("{USAGE}");
            }
            let url = &args[1];
            let fetcher = HttpFetcher::from_settings(&settings.fetch)?;
            let text = fetcher.fetch_text(url).await?;
            if text.trim().is_empty() {
                bail!("Failed to scrape content from {url}");
            }
            let chunks = orchestrator.ingest(&text)?;
            println!("Indexed {chunks} chunks from {url}");
            ask(&orchestrator, &args[2..].join(" "), no_llm).await?;
        }
        other => bail!("unknown command '{other}'\n\n{USAGE}"),
    }
    Ok(())
}

fn take_flag(args: &mut Vec<String>, flag: &str) -> bool {
    let before = args.len();
    args.retain(|a| a != flag);
    args.len() != before
}

fn prompt() -> Result<()> {
    print!("? ");
    io::stdout().flush()?;
    Ok(())
}

/// Ingest every `.txt` file under `dir`, in path order. Files with no
/// usable text are skipped.
fn ingest_dir(orchestrator: &RetrievalOrchestrator, dir: &Path) -> Result<usize> {
    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| p.extension().and_then(|s| s.to_str()) == Some("txt"))
        .collect();
    files.sort();
    if files.is_empty() {
        bail!("no .txt files found under {}", dir.display());
    }

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner} [{bar:40}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    let mut total = 0usize;
    for path in &files {
        pb.set_message(path.file_name().and_then(|n| n.to_str()).unwrap_or_default().to_string());
        let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        match orchestrator.ingest(&text) {
            Ok(n) => total += n,
            Err(Error::EmptyContent) => pb.println(format!("skipped empty file {}", path.display())),
            Err(e) => return Err(e).with_context(|| format!("ingesting {}", path.display())),
        }
        pb.inc(1);
    }
    pb.finish_with_message("done");
    Ok(total)
}

async fn ask(orchestrator: &RetrievalOrchestrator, question: &str, no_llm: bool) -> Result<()> {
    if no_llm {
        let ranked = orchestrator.retrieve(question, orchestrator.context_size())?;
        if ranked.is_empty() {
            println!("{}", webrag_rag::NO_KNOWLEDGE_SENTINEL);
        }
        for (i, text) in ranked.iter().enumerate() {
            println!("[{}] {}\n", i + 1, text);
        }
        return Ok(());
    }
    let answer = orchestrator.answer(question).await?;
    println!("{answer}");
    Ok(())
}
