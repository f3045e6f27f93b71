//! redgreen - model-driven TDD and verified edits
//!
//! Command-line front end for the TDD loop, the autonomous edit loop and the
//! verification tools.

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use futures::StreamExt;
use redgreen::config::ConfigValidator;
use redgreen::llm::ClaudeClient;
use redgreen::tdd::suggest_test_filename;
use redgreen::verification::{FileSnapshot, VerificationOptions};
use redgreen::{
    create_llm_client, detect_test_framework, load_transcript, AutonomousSession, ChatMessage,
    FileCache, LlmClient, LocalHost, ProjectConfig, RedGreenError, SuccessCriteria, TaskAnalyzer,
    TddSession, TestLayout, VerificationContext, VerificationEngine,
};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "redgreen")]
#[command(version)]
#[command(about = "Model-driven red-green-refactor cycles and verified edits", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Project directory (defaults to current directory)
    #[arg(short, long, global = true, default_value = ".")]
    project: PathBuf,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit log records as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Model selection shared by the commands that call a model.
#[derive(Args)]
struct ModelArgs {
    /// Model provider: claude, ollama or mock
    #[arg(long, env = "REDGREEN_PROVIDER")]
    provider: Option<String>,

    /// Model name for the provider
    #[arg(long, env = "REDGREEN_MODEL")]
    model: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a red-green-refactor cycle for a requirement
    Tdd {
        /// What to implement
        #[arg(required = true, num_args = 1..)]
        request: Vec<String>,

        /// Earlier conversation (JSON array of {role, content})
        #[arg(long, value_name = "FILE")]
        transcript: Option<PathBuf>,

        #[command(flatten)]
        model: ModelArgs,

        /// Maximum GREEN iterations
        #[arg(long)]
        max_iterations: Option<u32>,
    },

    /// Edit a file until the change passes verification
    Autonomous {
        /// What to change
        instruction: String,

        /// File to edit
        #[arg(long, value_name = "PATH")]
        file: PathBuf,

        #[command(flatten)]
        model: ModelArgs,

        /// Maximum edit attempts
        #[arg(long)]
        max_attempts: Option<u32>,

        /// Do not ask the model to judge its own edits
        #[arg(long)]
        no_judge: bool,
    },

    /// Detect the project's test framework
    Detect {
        /// Request text used for language hints
        #[arg(long)]
        request: Option<String>,

        /// File treated as open in the editor
        #[arg(long, value_name = "PATH")]
        current_file: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Derive success criteria from an instruction
    Analyze {
        /// The instruction to analyze
        instruction: String,

        /// File the instruction targets
        #[arg(long, value_name = "PATH")]
        file: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Verify a before/after pair against an instruction
    Verify {
        /// The instruction the change was meant to satisfy
        instruction: String,

        /// Content before the change
        #[arg(long, value_name = "FILE")]
        before: PathBuf,

        /// Content after the change
        #[arg(long, value_name = "FILE")]
        after: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show or validate settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective settings
    Show {
        /// Output only the JSON document
        #[arg(long)]
        json: bool,
    },

    /// Validate the settings file
    Validate,
}

fn init_tracing(verbose: bool, json: bool) {
    let default = if verbose {
        "redgreen=debug,info"
    } else {
        "redgreen=info,warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    // Resolve project path
    let project_path = cli.project.canonicalize().unwrap_or(cli.project.clone());

    if !project_path.exists() {
        eprintln!(
            "{} Project directory does not exist: {}",
            "Error:".red().bold(),
            project_path.display()
        );
        std::process::exit(1);
    }

    if let Err(e) = run(cli.command, &project_path, cli.verbose).await {
        if let Some(err) = e.downcast_ref::<RedGreenError>() {
            eprintln!("{} {}", "Error:".red().bold(), err);
            std::process::exit(err.exit_code());
        }
        return Err(e);
    }
    Ok(())
}

async fn run(command: Commands, project: &Path, verbose: bool) -> anyhow::Result<()> {
    match command {
        Commands::Tdd {
            request,
            transcript,
            model,
            max_iterations,
        } => {
            let mut config = ProjectConfig::load(project)?;
            config.apply_overrides(
                model.provider.as_deref(),
                model.model.as_deref(),
                max_iterations,
            );
            ensure_valid(&config)?;
            let client = build_client(&config, project)?;
            let host = LocalHost::new(project);

            let mut messages = match transcript {
                Some(path) => load_transcript(&path)?,
                None => Vec::new(),
            };
            messages.push(ChatMessage::user(request.join(" ")));
            debug!(messages = messages.len(), "Transcript ready");

            let session = TddSession::new(&host, client.as_ref())
                .with_config(config.tdd.clone())
                .with_cache_ttl(config.cache.ttl());
            print_stream(session.run(messages)).await?;
        }

        Commands::Autonomous {
            instruction,
            file,
            model,
            max_attempts,
            no_judge,
        } => {
            let mut config = ProjectConfig::load(project)?;
            config.apply_overrides(model.provider.as_deref(), model.model.as_deref(), None);
            if let Some(n) = max_attempts {
                config.verification.max_attempts = n;
            }
            if no_judge {
                config.verification.use_llm = false;
            }
            ensure_valid(&config)?;
            let client = build_client(&config, project)?;
            let host = LocalHost::new(project);

            let session = AutonomousSession::new(&host, client.as_ref())
                .with_config(config.verification.clone());
            print_stream(session.run(instruction, file)).await?;
        }

        Commands::Detect {
            request,
            current_file,
            json,
        } => {
            let config = ProjectConfig::load(project)?;
            let host = match current_file {
                Some(path) => LocalHost::new(project).with_current_file(path),
                None => LocalHost::new(project),
            };
            let mut cache = FileCache::new(config.cache.ttl());
            let framework =
                detect_test_framework(&host, project, &mut cache, request.as_deref()).await;

            if json {
                println!("{}", serde_json::to_string_pretty(&framework.descriptor())?);
            } else {
                let layout = match framework.layout() {
                    TestLayout::Colocated => "colocated (implementation + test module)",
                    TestLayout::SeparateFile => "separate test file",
                };
                println!("{} {}", "Framework:".bold(), framework.name().green());
                println!("   Command:  {}", framework.command());
                println!("   Language: {}", framework.language());
                println!("   Layout:   {}", layout);
                if let Some(request) = &request {
                    println!("   Test file: {}", suggest_test_filename(request, framework));
                }
            }
        }

        Commands::Analyze {
            instruction,
            file,
            json,
        } => {
            let content = match &file {
                Some(path) => Some(read_input(project, path)?),
                None => None,
            };
            let criteria = TaskAnalyzer::new().analyze(&instruction, content.as_deref());

            if json {
                println!("{}", serde_json::to_string_pretty(&criteria)?);
            } else {
                print_criteria(&criteria);
            }
        }

        Commands::Verify {
            instruction,
            before,
            after,
            json,
        } => {
            let config = ProjectConfig::load(project)?;
            let before_content = read_input(project, &before)?;
            let after_content = read_input(project, &after)?;

            let criteria = TaskAnalyzer::new().analyze(&instruction, Some(&before_content));
            let mut context = VerificationContext::new(instruction, criteria);
            context.add_snapshot(FileSnapshot::capture(after, before_content).complete(after_content));

            let options = VerificationOptions {
                use_llm: false,
                ..VerificationOptions::from(&config.verification)
            };
            let result = VerificationEngine::new(options)
                .verify(&context, None, None)
                .await;

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                let summary = if result.passed {
                    result.summary.green()
                } else {
                    result.summary.red()
                };
                println!("{}", summary);
                if !result.suggestions.is_empty() {
                    println!("\n{}", "Suggestions:".yellow().bold());
                    for suggestion in &result.suggestions {
                        println!("  - {}", suggestion);
                    }
                }
            }

            if !result.passed {
                std::process::exit(1);
            }
        }

        Commands::Config { action } => match action {
            ConfigAction::Show { json } => {
                let config = ProjectConfig::load(project)?;
                if !json {
                    match ProjectConfig::locate(project) {
                        Some(path) => println!("{} {}", "Settings:".bold(), path.display()),
                        None => println!("{} built-in defaults", "Settings:".bold()),
                    }
                }
                println!("{}", serde_json::to_string_pretty(&config)?);
            }
            ConfigAction::Validate => {
                let report = ConfigValidator::new(project).validate();
                if verbose {
                    println!("{}", report.verbose_report());
                } else {
                    for error in &report.errors {
                        println!("  {} {}", "✗".red(), error);
                    }
                    for warning in &report.warnings {
                        println!("  {} {}", "⚠".yellow(), warning);
                    }
                    let summary = report.summary();
                    if report.is_valid() {
                        println!("{}", summary.green());
                    } else {
                        println!("{}", summary.red());
                    }
                }
                std::process::exit(report.exit_code());
            }
        },
    }

    Ok(())
}

/// Reject settings with problems before any model is started.
fn ensure_valid(config: &ProjectConfig) -> redgreen::Result<()> {
    let problems = config.validate();
    if problems.is_empty() {
        return Ok(());
    }
    Err(RedGreenError::invalid_config("settings", problems.join("; ")))
}

fn build_client(config: &ProjectConfig, project: &Path) -> anyhow::Result<Box<dyn LlmClient>> {
    let missing = match config.llm.provider.as_str() {
        "claude" if !ClaudeClient::available() => Some("claude"),
        "ollama" if which::which("ollama").is_err() => Some("ollama"),
        _ => None,
    };
    if let Some(tool) = missing {
        return Err(RedGreenError::MissingTool {
            tool: tool.to_string(),
        }
        .into());
    }
    create_llm_client(&config.llm, project)
}

fn read_input(project: &Path, path: &Path) -> redgreen::Result<String> {
    let full = if path.is_absolute() {
        path.to_path_buf()
    } else {
        project.join(path)
    };
    std::fs::read_to_string(&full).map_err(|e| {
        debug!(path = %full.display(), "Read failed: {}", e);
        RedGreenError::ReadFailed { path: full }
    })
}

async fn print_stream(mut progress: futures::stream::BoxStream<'_, String>) -> anyhow::Result<()> {
    let mut stdout = std::io::stdout();
    while let Some(text) = progress.next().await {
        write!(stdout, "{}", text)?;
        stdout.flush()?;
    }
    writeln!(stdout)?;
    Ok(())
}

fn print_criteria(criteria: &SuccessCriteria) {
    println!("{} {}", "Task type:".bold(), criteria.task_type.to_string().cyan());

    if !criteria.patterns_to_eliminate.is_empty() {
        println!("\n{}", "Eliminate:".bold());
        for pattern in &criteria.patterns_to_eliminate {
            let marker = if pattern.critical { " (critical)" } else { "" };
            println!("  - {}{}", pattern.description, marker.red());
        }
    }
    if !criteria.patterns_to_introduce.is_empty() {
        println!("\n{}", "Introduce:".bold());
        for pattern in &criteria.patterns_to_introduce {
            let marker = if pattern.critical { " (critical)" } else { "" };
            println!("  - {}{}", pattern.description, marker.red());
        }
    }
    if !criteria.structural_changes.is_empty() {
        println!("\n{}", "Structural changes:".bold());
        for change in &criteria.structural_changes {
            println!("  - {} ({})", change.description, change.indicator.dimmed());
        }
    }
    if !criteria.errors_to_fix.is_empty() {
        println!("\n{}", "Errors to fix:".bold());
        for error in &criteria.errors_to_fix {
            println!("  - {}", error);
        }
    }
}
