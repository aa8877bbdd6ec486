mod doctor;
mod init;

use std::path::{Path, PathBuf};

use clap::{CommandFactory, Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use baton_core::config::{agent_names, load_config};
use baton_engine::artifacts::RunStatus;
use baton_engine::runner::{self, RunOptions};

#[derive(Parser)]
#[command(name = "baton", version, about = "Declarative workflow runner for coding agents")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute the workflow
    Run {
        /// Prompt text
        #[arg(long)]
        prompt: Option<String>,
        /// Prompt file path
        #[arg(long)]
        prompt_file: Option<PathBuf>,
        /// Working directory
        #[arg(long)]
        workdir: Option<PathBuf>,
        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
        /// Resolve and persist the plan without executing
        #[arg(long)]
        dry_run: bool,
        /// Verbose logging
        #[arg(long)]
        verbose: bool,
    },
    /// List agents in the config
    Agents {
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        workdir: Option<PathBuf>,
    },
    /// Print the resolved workflow as JSON
    Explain {
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        workdir: Option<PathBuf>,
    },
    /// Create a starter config
    Init {
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        workdir: Option<PathBuf>,
        /// Overwrite existing files
        #[arg(long)]
        force: bool,
    },
    /// Validate environment and config
    Doctor {
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        workdir: Option<PathBuf>,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Run { verbose: true, .. } => "debug",
        _ => "info",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Run {
            prompt,
            prompt_file,
            workdir,
            config,
            dry_run,
            verbose,
        } => {
            let cfg_path = resolve_config_path(config.as_deref(), workdir.as_deref());
            let cfg = load_config(&cfg_path)?;
            let outcome = runner::run(
                &cfg,
                &cfg_path,
                RunOptions {
                    prompt,
                    prompt_file,
                    workdir,
                    dry_run,
                    verbose,
                },
            )
            .await?;

            if outcome.status == RunStatus::Failed {
                error!(path = %outcome.run_dir.display(), "run artifacts");
                let message = outcome.error.unwrap_or_else(|| "run failed".to_string());
                anyhow::bail!(message);
            }
            info!(path = %outcome.run_dir.display(), "run succeeded");
        }
        Commands::Agents { config, workdir } => {
            let cfg_path = resolve_config_path(config.as_deref(), workdir.as_deref());
            let cfg = load_config(&cfg_path)?;
            for name in agent_names(&cfg) {
                println!("{}", name);
            }
        }
        Commands::Explain { config, workdir } => {
            let cfg_path = resolve_config_path(config.as_deref(), workdir.as_deref());
            let cfg = load_config(&cfg_path)?;
            println!("{}", serde_json::to_string_pretty(&cfg.workflow)?);
        }
        Commands::Init {
            config,
            workdir,
            force,
        } => {
            let cfg_path = resolve_config_path(config.as_deref(), workdir.as_deref());
            init::write_starter(&cfg_path, force)?;
            info!(path = %cfg_path.display(), "created");
        }
        Commands::Doctor { config, workdir } => {
            let cfg_path = resolve_config_path(config.as_deref(), workdir.as_deref());
            let issues = doctor::run_doctor(&cfg_path);
            if issues > 0 {
                anyhow::bail!("doctor found {} issue(s)", issues);
            }
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            clap_complete::generate(shell, &mut cmd, name, &mut std::io::stdout());
        }
    }

    Ok(())
}

/// Config discovery: explicit path first (joined to the workdir when
/// relative), then `baton.yaml` in the workdir, then the project and
/// home fallbacks.
fn resolve_config_path(config: Option<&Path>, workdir: Option<&Path>) -> PathBuf {
    if let Some(cfg) = config {
        if let Some(wd) = workdir {
            if cfg.is_absolute() {
                return cfg.to_path_buf();
            }
            return wd.join(cfg);
        }
        return cfg.to_path_buf();
    }

    let base = workdir.unwrap_or_else(|| Path::new("."));

    let primary = base.join("baton.yaml");
    if primary.is_file() {
        return primary;
    }

    let fallback = base.join(".baton").join("configs").join("default.yaml");
    if fallback.is_file() {
        return fallback;
    }

    if let Some(home) = dirs::home_dir() {
        let home_fallback = home.join(".baton").join("configs").join("default.yaml");
        if home_fallback.is_file() {
            return home_fallback;
        }
    }

    primary
}
