use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};

use examforge::store::{self, Store};
use examforge::{assemble, bundle, unpack};

#[derive(Parser)]
#[command(name = "examforge", about = "Exam dump ingestion and offline study bundles")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a zip archive or folder tree of scraped questions into a saved exam
    Import {
        /// Path to a .zip archive or a directory of topic_X_question_Y folders
        path: PathBuf,
        /// Exam name; an existing exam with the same name is replaced
        #[arg(short, long)]
        name: String,
    },
    /// Render a saved exam as one self-contained offline HTML document
    Export {
        /// Exam name
        name: String,
        /// Output file (default: <name-with-underscores>_offline.html)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List saved exams
    List,
    /// Per-question overview of one exam
    Show {
        /// Exam name
        name: String,
        /// Max rows to display
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
    },
    /// Delete a saved exam and its images
    Delete {
        /// Exam name
        name: String,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let store = Store::open();

    let result = match cli.command {
        Commands::Import { path, name } => {
            let folders = if unpack::is_zip_path(&path)? {
                let bytes = fs::read(&path)
                    .with_context(|| format!("cannot read {}", path.display()))?;
                unpack::unpack_zip(&bytes)?
            } else if path.is_dir() {
                unpack::read_folder_tree(&path)?
            } else {
                bail!("{} is neither a .zip file nor a directory", path.display());
            };
            if folders.is_empty() {
                println!("No question folders found in {}.", path.display());
                return Ok(());
            }

            println!("Processing {} folders...", folders.len());
            // Assemble into a staging directory; the previous import's images
            // stay live until the new exam is fully saved.
            let images_dir = store.stage_images_dir(&name)?;
            let records = match assemble::assemble(&folders, &images_dir) {
                Ok(records) => records,
                Err(err) => {
                    store.discard_staged_images(&name)?;
                    return Err(err);
                }
            };
            if records.is_empty() {
                store.discard_staged_images(&name)?;
                println!(
                    "No valid questions found in {}. Check the folder structure and file naming.",
                    path.display()
                );
                return Ok(());
            }

            let topics: BTreeSet<u32> = records.iter().map(|r| r.topic_index).collect();
            let image_count = records
                .iter()
                .flat_map(|r| r.question_images.iter().chain(r.answer_images.iter()))
                .collect::<BTreeSet<_>>()
                .len();
            let data = store.save_exam(&name, records)?;
            store.commit_images(&name)?;
            println!(
                "Saved exam '{}': {} questions, {} topics, {} images.",
                name,
                data.question_count,
                topics.len(),
                image_count
            );
            Ok(())
        }
        Commands::Export { name, output } => {
            let data = store.load_exam(&name)?;
            let html = bundle::generate(&data, &store.images_dir(&name))?;
            let out = output.unwrap_or_else(|| PathBuf::from(bundle::bundle_file_name(&name)));
            fs::write(&out, html).with_context(|| format!("cannot write {}", out.display()))?;
            println!("Wrote {} ({} questions).", out.display(), data.question_count);
            Ok(())
        }
        Commands::List => {
            let names = store.list_exams()?;
            if names.is_empty() {
                println!("No exams found. Run 'import' first.");
                return Ok(());
            }
            println!(
                "{:>3} | {:<32} | {:>9} | {:>6} | {:>6} | {:<10}",
                "#", "Exam", "Questions", "Topics", "Images", "Created"
            );
            println!("{}", "-".repeat(84));
            for (i, name) in names.iter().enumerate() {
                let data = store.load_exam(name)?;
                let topics: BTreeSet<u32> =
                    data.questions.iter().map(|r| r.topic_index).collect();
                println!(
                    "{:>3} | {:<32} | {:>9} | {:>6} | {:>6} | {:<10}",
                    i + 1,
                    truncate(name, 32),
                    data.question_count,
                    topics.len(),
                    store.image_count(name),
                    data.created_at.format("%Y-%m-%d"),
                );
            }
            println!("\n{} exams", names.len());
            Ok(())
        }
        Commands::Show { name, limit } => {
            let data = store.load_exam(&name)?;
            println!(
                "{:<26} | {:<15} | {:>7} | {:<14} | {:>6}",
                "Question", "Kind", "Choices", "Answer", "Images"
            );
            println!("{}", "-".repeat(80));
            for record in data.questions.iter().take(limit) {
                let kind = match record.kind {
                    store::QuestionKind::MultipleChoice => "multiple choice",
                    store::QuestionKind::Descriptive => "descriptive",
                };
                let answer = record
                    .correct_answer
                    .as_deref()
                    .or(record.suggested_answer.as_deref())
                    .unwrap_or("-");
                println!(
                    "{:<26} | {:<15} | {:>7} | {:<14} | {:>6}",
                    truncate(&record.display_name, 26),
                    kind,
                    record.choices.len(),
                    truncate(answer, 14),
                    record.question_images.len() + record.answer_images.len(),
                );
            }
            if data.questions.len() > limit {
                println!("... and {} more", data.questions.len() - limit);
            }
            Ok(())
        }
        Commands::Delete { name } => {
            if store.delete_exam(&name)? {
                println!("Deleted exam '{}'.", name);
            } else {
                println!("No exam named '{}'.", name);
            }
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {:.1}s", elapsed.as_secs_f64());
    }

    result
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}
