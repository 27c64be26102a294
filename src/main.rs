use clap::{Parser, Subcommand};
use confab::chat::ChatSession;
use confab::config::Config;
use confab::error::Result;
use confab::hub::{HuggingFaceHub, ModelHub};
use confab::llm::LlamaLoader;
use confab::models::downloader::format_bytes;
use confab::models::maintenance;
use confab::models::{DownloadEvent, ModelManager, Registry};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "confab")]
#[command(about = "Local chat assistant backed by small GGUF models", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the interactive chat session (default)
    Chat,
    /// Inspect and clean up downloaded models
    Models {
        #[command(subcommand)]
        command: Option<ModelsCommand>,
    },
}

#[derive(Subcommand)]
enum ModelsCommand {
    /// Print all registry entries with size and status
    List,
    /// Drop entries whose file is missing, then remove empty directories
    Clean,
    /// Show counts and total disk usage
    Stats,
    /// Remove a model's file, its directory if empty, and its entry
    Delete { model_id: String },
    /// Rewrite relative registry paths to absolute paths
    FixPaths,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command {
        None | Some(Commands::Chat) => run_chat(config).await,
        Some(Commands::Models { command }) => run_models(&config, command),
    }
}

async fn run_chat(config: Config) -> Result<()> {
    let log_path = confab::logging::init(&config.directories.logs_dir())?;
    tracing::info!("Starting confab chat");
    tracing::info!("Models dir: {}", config.directories.models_dir().display());
    tracing::info!("Registry: {}", config.directories.registry_path().display());
    tracing::info!("Log file: {}", log_path.display());

    let registry = Registry::load(&config.directories.registry_path())?;
    let hub: Arc<dyn ModelHub> = Arc::new(HuggingFaceHub::new(config.download.timeout_secs)?);
    let loader = Arc::new(LlamaLoader::new()?);
    let manager = ModelManager::new(registry, Arc::clone(&hub), loader, &config);
    let mut session = ChatSession::new(manager, hub, config);

    println!("confab: chat with small GGUF models, fully local");
    println!("Fetching candidate models...");
    print_candidates(session.refresh_models().await);
    print_help();

    let stdin = std::io::stdin();
    loop {
        print!("you> ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match line.split_once(' ').map_or((line, ""), |(c, rest)| (c, rest.trim())) {
            ("/quit" | "/exit", _) => break,
            ("/help", _) => print_help(),
            ("/models", _) => print_candidates(session.candidates()),
            ("/refresh", _) => {
                println!("Refreshing candidate models...");
                print_candidates(session.refresh_models().await);
            }
            ("/status", _) => println!("{}", session.status()),
            ("/clear", _) => {
                session.clear();
                println!("Transcript cleared");
            }
            ("/load", "") => println!("Usage: /load <number|owner/name>"),
            ("/load", selection) => {
                let Some(model_id) = session.resolve_selection(selection) else {
                    println!("No candidate with that number; see /models");
                    continue;
                };
                println!("Preparing {model_id}...");
                let mut render = download_renderer();
                match session.download_and_load(&model_id, &mut render).await {
                    Ok(path) => println!("Model {model_id} loaded ({})", path.display()),
                    Err(e) => println!("Load failed: {e}"),
                }
            }
            (cmd, _) if cmd.starts_with('/') => {
                println!("Unknown command {cmd}; see /help");
            }
            _ => {
                let reply = session.send(line).await;
                println!("assistant> {reply}");
            }
        }
    }

    Ok(())
}

fn print_candidates(candidates: &[String]) {
    if candidates.is_empty() {
        println!("No candidate models found");
        return;
    }
    println!("Candidate models (sub-7B, quantized):");
    for (i, id) in candidates.iter().enumerate() {
        println!("{:>3}. {id}", i + 1);
    }
}

fn print_help() {
    println!("Commands:");
    println!("  /models          show the candidate list");
    println!("  /load <n|id>     download (if needed) and load a model");
    println!("  /refresh         re-run model discovery");
    println!("  /status          show the loaded model");
    println!("  /clear           clear the transcript");
    println!("  /quit            exit");
    println!("Anything else is sent to the model.");
}

/// Render download milestones: plain lines for the fixed milestones, an
/// indicatif bar for byte progress
fn download_renderer() -> impl FnMut(DownloadEvent) + Send {
    let mut bar: Option<ProgressBar> = None;
    move |event| match event {
        DownloadEvent::Started => println!("Starting download..."),
        DownloadEvent::FileSelected(name) => println!("Selected file: {name}"),
        DownloadEvent::Downloading {
            bytes_done,
            bytes_total,
        } => {
            let pb = bar.get_or_insert_with(|| match bytes_total {
                Some(total) => {
                    let pb = ProgressBar::new(total);
                    pb.set_style(
                        ProgressStyle::with_template(
                            "{bar:40.cyan/blue} {bytes}/{total_bytes} ({eta})",
                        )
                        .unwrap_or_else(|_| ProgressStyle::default_bar()),
                    );
                    pb
                }
                None => {
                    let pb = ProgressBar::new_spinner();
                    pb.set_style(
                        ProgressStyle::with_template("{spinner} {bytes} downloaded")
                            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
                    );
                    pb
                }
            });
            pb.set_position(bytes_done);
        }
        DownloadEvent::Completed(path) => {
            if let Some(pb) = bar.take() {
                pb.finish_and_clear();
            }
            println!("Download complete: {}", path.display());
        }
    }
}

fn run_models(config: &Config, command: Option<ModelsCommand>) -> Result<()> {
    let models_dir = config.directories.models_dir();
    let mut registry = Registry::load(&config.directories.registry_path())?;

    match command {
        Some(ModelsCommand::List) => cmd_list(&registry),
        Some(ModelsCommand::Clean) => cmd_clean(&mut registry, &models_dir),
        Some(ModelsCommand::Stats) => cmd_stats(&registry, &models_dir),
        Some(ModelsCommand::Delete { model_id }) => cmd_delete(&mut registry, &model_id),
        Some(ModelsCommand::FixPaths) => cmd_fix_paths(&mut registry),
        None => interactive_menu(&mut registry, &models_dir),
    }

    Ok(())
}

fn cmd_list(registry: &Registry) {
    let entries = maintenance::list_entries(registry);
    if entries.is_empty() {
        println!("No downloaded models");
        return;
    }

    println!("Downloaded models:");
    for (i, entry) in entries.iter().enumerate() {
        let (size, status) = match entry.size_bytes {
            Some(bytes) => (format_bytes(bytes), "available"),
            None => ("-".to_string(), "file missing"),
        };
        println!();
        println!("{}. {}", i + 1, entry.model_id);
        println!("   path:   {}", entry.path.display());
        println!("   size:   {size}");
        println!("   status: {status}");
        println!("   file:   {}", entry.file);
    }
}

fn cmd_clean(registry: &mut Registry, models_dir: &Path) {
    match maintenance::clean(registry, models_dir) {
        Ok(report) => {
            for id in &report.dropped_entries {
                println!("Dropped stale entry: {id}");
            }
            for dir in &report.removed_dirs {
                println!("Removed empty directory: {}", dir.display());
            }
            if report.dropped_entries.is_empty() && report.removed_dirs.is_empty() {
                println!("Nothing to clean");
            } else {
                println!("Clean complete");
            }
        }
        Err(e) => println!("Clean failed: {e}"),
    }
}

fn cmd_stats(registry: &Registry, models_dir: &Path) {
    let stats = maintenance::stats(registry, models_dir);
    println!("Total models:   {}", stats.total);
    println!("Valid models:   {}", stats.valid);
    println!("Invalid models: {}", stats.invalid);
    println!("Disk usage:     {}", format_bytes(stats.total_bytes));
    println!("Models dir:     {}", stats.models_dir.display());
}

fn cmd_delete(registry: &mut Registry, model_id: &str) {
    match maintenance::delete(registry, model_id) {
        Ok(report) => {
            if let Some(file) = &report.removed_file {
                println!(
                    "Removed file: {} (freed {})",
                    file.display(),
                    format_bytes(report.freed_bytes)
                );
            }
            if let Some(dir) = &report.removed_dir {
                println!("Removed empty directory: {}", dir.display());
            }
            println!("Removed registry entry: {}", report.model_id);
        }
        Err(e) => println!("Delete failed: {e}"),
    }
}

fn cmd_fix_paths(registry: &mut Registry) {
    match registry.fix_paths() {
        Ok(fixes) if fixes.is_empty() => println!("All paths already absolute"),
        Ok(fixes) => {
            for fix in fixes {
                println!("Fixed {}", fix.model_id);
                println!("   old: {}", fix.old_path.display());
                println!("   new: {}", fix.new_path.display());
                println!(
                    "   status: {}",
                    if fix.exists { "file exists" } else { "file missing" }
                );
            }
        }
        Err(e) => println!("Fix-paths failed: {e}"),
    }
}

fn prompt_line(message: &str) -> Option<String> {
    print!("{message}");
    std::io::stdout().flush().ok()?;
    let mut line = String::new();
    if std::io::stdin().read_line(&mut line).ok()? == 0 {
        return None;
    }
    Some(line.trim().to_string())
}

fn confirm(message: &str) -> bool {
    prompt_line(message).is_some_and(|answer| answer.eq_ignore_ascii_case("y"))
}

fn interactive_menu(registry: &mut Registry, models_dir: &Path) {
    loop {
        println!();
        println!("confab model maintenance");
        println!("1. List models");
        println!("2. Delete a model");
        println!("3. Clean registry and directories");
        println!("4. Stats");
        println!("5. Exit");

        let Some(choice) = prompt_line("Choose (1-5): ") else {
            break;
        };

        match choice.as_str() {
            "1" => cmd_list(registry),
            "2" => {
                cmd_list(registry);
                if registry.is_empty() {
                    continue;
                }
                let Some(model_id) = prompt_line("Model id to delete: ") else {
                    break;
                };
                if model_id.is_empty() {
                    continue;
                }
                if confirm(&format!("Delete model '{model_id}'? (y/N): ")) {
                    cmd_delete(registry, &model_id);
                }
            }
            "3" => {
                if confirm("Clean registry and remove empty directories? (y/N): ") {
                    cmd_clean(registry, models_dir);
                }
            }
            "4" => cmd_stats(registry, models_dir),
            "5" => break,
            _ => println!("Invalid choice, try again"),
        }
    }
}
