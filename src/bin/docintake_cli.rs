use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use docintake::{
    classification::DocumentType,
    config, logging,
    extraction::FileFormat,
    service::{IntakeApi, IntakeService},
    session::ChatScope,
};
use walkdir::WalkDir;

#[derive(Parser)]
#[command(
    name = "docintake-cli",
    about = "Classify, summarize and query office documents from the command line"
)]
struct Cli {
    /// Log pipeline progress to stderr.
    #[arg(long, short, global = true)]
    verbose: bool,
    /// Print results as JSON.
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Suggest a document type for every file.
    Classify {
        /// Files or directories to read.
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Summarize every file with the template of its suggested type.
    Summarize {
        /// Only summarize documents of this type.
        #[arg(long = "type")]
        document_type: Option<String>,
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// List the deadlines found in every file.
    Deadlines {
        /// Only inspect documents of this type.
        #[arg(long = "type")]
        document_type: Option<String>,
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Ask one question about the files.
    Ask {
        /// Question to answer.
        #[arg(long, short)]
        question: String,
        /// Restrict the question to one uploaded document.
        #[arg(long)]
        document: Option<String>,
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
}

impl Command {
    fn paths(&self) -> &[PathBuf] {
        match self {
            Self::Classify { paths }
            | Self::Summarize { paths, .. }
            | Self::Deadlines { paths, .. }
            | Self::Ask { paths, .. } => paths,
        }
    }
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    logging::init_cli_tracing(cli.verbose);
    config::init_config();
    let service = IntakeService::from_config(config::get_config())
        .context("failed to initialize intake service")?;

    let mut uploaded = 0;
    for (name, path) in collect_inputs(cli.command.paths())? {
        let bytes = fs::read(&path).with_context(|| format!("reading {}", path.display()))?;
        let outcome = service
            .upload(&name, bytes)
            .await
            .with_context(|| format!("uploading {}", path.display()))?;
        uploaded += outcome.added.len();
    }
    if uploaded == 0 {
        bail!("no supported documents found");
    }

    match cli.command {
        Command::Classify { .. } => {
            let classifications = service.classify_all().await?;
            if cli.json {
                print_json(&classifications)?;
            } else {
                for classification in classifications {
                    println!("{}\t{}", classification.document_type, classification.name);
                }
            }
        }
        Command::Summarize { document_type, .. } => {
            for document_type in confirmed_types(&service, document_type.as_deref()).await? {
                let summaries = service.summarize_type(&document_type).await?;
                if cli.json {
                    print_json(&summaries)?;
                    continue;
                }
                for summary in summaries {
                    println!("## {} ({document_type})\n\n{}\n", summary.name, summary.summary);
                }
            }
        }
        Command::Deadlines { document_type, .. } => {
            for document_type in confirmed_types(&service, document_type.as_deref()).await? {
                let documents = service.deadlines_for_type(&document_type).await?;
                if cli.json {
                    print_json(&documents)?;
                    continue;
                }
                for document in documents {
                    println!("## {}", document.name);
                    if document.deadlines.is_empty() {
                        println!("(nenhum prazo encontrado)");
                    }
                    for deadline in document.deadlines {
                        println!("- {deadline}");
                    }
                    println!();
                }
            }
        }
        Command::Ask {
            question, document, ..
        } => {
            let answer = service.ask(ChatScope::from(document), &question).await?;
            if cli.json {
                print_json(&answer)?;
            } else {
                println!("{}", answer.answer);
            }
        }
    }
    Ok(())
}

/// Classify and confirm everything, then return the types to report on.
async fn confirmed_types(
    service: &IntakeService,
    only: Option<&str>,
) -> Result<Vec<DocumentType>> {
    service.classify_all().await?;
    service.confirm_all().await;
    let groups = service.groups().await;
    Ok(match only {
        Some(raw) => vec![DocumentType::normalize(raw)],
        None => groups.into_keys().collect(),
    })
}

/// Resolve files and directories into `(document name, path)` pairs.
///
/// Files found by walking a directory are named by their path relative to it.
fn collect_inputs(paths: &[PathBuf]) -> Result<Vec<(String, PathBuf)>> {
    let mut inputs = Vec::new();
    for root in paths {
        if root.is_file() {
            inputs.push((file_name(root), root.clone()));
            continue;
        }
        if !root.is_dir() {
            bail!("{} does not exist", root.display());
        }
        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = entry.with_context(|| format!("walking {}", root.display()))?;
            if !entry.file_type().is_file() || !is_accepted(entry.path()) {
                continue;
            }
            let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
            inputs.push((
                relative.to_string_lossy().replace('\\', "/"),
                entry.path().to_path_buf(),
            ));
        }
    }
    Ok(inputs)
}

fn is_accepted(path: &Path) -> bool {
    let name = file_name(path);
    FileFormat::from_filename(&name).is_some() || name.to_lowercase().ends_with(".zip")
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
