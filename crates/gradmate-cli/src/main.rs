mod config;
mod serve_cmd;
mod tasks_cmd;
mod usage_cmd;

use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};

use gradmate_core::assist::AssistService;
use gradmate_core::generator::{GeminiClient, TextGenerator};
use gradmate_core::plan::{ManagerConfig, StudyPlanTaskManager};
use gradmate_core::store::{MemoryPlanStore, PgPlanStore, PlanStore};
use gradmate_db::config::DbConfig;
use gradmate_db::pool;

use config::GradmateConfig;

#[derive(Parser)]
#[command(name = "gradmate", about = "GradMate study plan and AI study helper backend")]
struct Cli {
    /// Database URL (overrides GRADMATE_DATABASE_URL env var)
    #[arg(long, global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a gradmate config file (no database required)
    Init {
        /// PostgreSQL connection URL
        #[arg(long, default_value = DbConfig::DEFAULT_URL)]
        db_url: String,
        /// Gemini API key to store in the config file
        #[arg(long)]
        api_key: Option<String>,
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Initialize the gradmate database (requires config file or env vars)
    DbInit,
    /// Run the JSON API server
    Serve {
        /// Address to bind (defaults to server.bind from the config file)
        #[arg(long)]
        bind: Option<String>,
        /// Port to listen on (defaults to server.port from the config file)
        #[arg(long)]
        port: Option<u16>,
        /// Keep plans in memory instead of PostgreSQL (data is lost on exit)
        #[arg(long)]
        in_memory: bool,
    },
    /// Study plan task management for one user
    Tasks {
        #[command(subcommand)]
        command: TaskCommands,
    },
    /// Show recent AI usage for a user
    Usage {
        /// User ID
        #[arg(long)]
        user: String,
        /// Maximum number of records to show
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
}

#[derive(Subcommand)]
pub enum TaskCommands {
    /// List a user's tasks ordered by due date
    List {
        /// User ID
        #[arg(long)]
        user: String,
    },
    /// Add a pending task
    Add {
        /// User ID
        #[arg(long)]
        user: String,
        /// Task title
        title: String,
        /// Due date (YYYY-MM-DD or RFC 3339)
        #[arg(long)]
        due: Option<String>,
        /// Title for the plan if one has to be created
        #[arg(long)]
        plan_title: Option<String>,
    },
    /// Mark a task done
    Done {
        /// User ID
        #[arg(long)]
        user: String,
        /// Task ID (<plan-id>:<task title>)
        id: String,
    },
    /// Remove every task with the given ID's title
    Remove {
        /// User ID
        #[arg(long)]
        user: String,
        /// Task ID (<plan-id>:<task title>)
        id: String,
    },
    /// Generate tasks from a natural-language request
    Generate {
        /// User ID
        #[arg(long)]
        user: String,
        /// What to plan for
        request: String,
        /// Number of tasks to ask for
        #[arg(long)]
        count: Option<usize>,
        /// Title for the plan if one has to be created
        #[arg(long)]
        title: Option<String>,
    },
    /// List a user's study plans
    Plans {
        /// User ID
        #[arg(long)]
        user: String,
    },
}

/// Execute the `gradmate init` command: write config file.
fn cmd_init(db_url: &str, api_key: Option<String>, force: bool) -> Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let has_key = api_key.is_some();
    let cfg = config::ConfigFile {
        database: config::DatabaseSection {
            url: db_url.to_string(),
        },
        ai: config::AiSection {
            api_key,
            ..config::AiSection::default()
        },
        server: config::ServerSection::default(),
    };

    config::save_config(&cfg)?;

    println!("Config written to {}", path.display());
    println!("  database.url = {db_url}");
    println!("  ai.model = {}", cfg.ai.model);
    if !has_key {
        println!("  ai.api_key not set; AI features stay disabled until GEMINI_API_KEY is set.");
    }
    println!();
    println!("Next: run `gradmate db-init` to create and migrate the database.");

    Ok(())
}

/// Execute the `gradmate db-init` command: create database and run migrations.
async fn cmd_db_init(cli_db_url: Option<&str>) -> Result<()> {
    let resolved = GradmateConfig::resolve(cli_db_url)?;

    println!("Initializing gradmate database...");

    // 1. Create the database if it does not exist.
    match pool::ensure_database_exists(&resolved.db_config).await? {
        pool::DatabaseStatus::Created => println!("Created database."),
        pool::DatabaseStatus::Existing => println!("Database already exists."),
    }

    // 2. Connect to the target database.
    let db_pool = pool::create_pool(&resolved.db_config).await?;

    // 3. Run migrations.
    pool::run_migrations(&db_pool).await?;

    // 4. Print success with table counts.
    let counts = pool::table_counts(&db_pool).await?;
    println!("Database ready. Tables:");
    for (table, count) in &counts {
        println!("  {table}: {count} rows");
    }

    db_pool.close().await;

    println!("gradmate db-init complete.");
    Ok(())
}

/// Wire the manager and AI helpers over `store`.
fn build_services(
    store: Arc<dyn PlanStore>,
    resolved: &GradmateConfig,
) -> Result<(Arc<StudyPlanTaskManager>, Arc<AssistService>)> {
    let client = GeminiClient::new(resolved.gemini.clone())?;
    if resolved.gemini.api_key.is_none() {
        tracing::warn!("no Gemini API key configured; AI features will return errors");
    } else {
        tracing::info!(model = client.model(), "AI features enabled");
    }
    let generator: Arc<dyn TextGenerator> = Arc::new(client);
    let manager_config = ManagerConfig {
        ai_timeout: resolved.gemini.timeout,
        ..ManagerConfig::default()
    };
    let manager = Arc::new(StudyPlanTaskManager::new(
        store.clone(),
        generator.clone(),
        manager_config,
    ));
    let assist = Arc::new(AssistService::new(
        generator,
        store,
        resolved.gemini.timeout,
    ));
    Ok((manager, assist))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init {
            db_url,
            api_key,
            force,
        } => {
            cmd_init(&db_url, api_key, force)?;
        }
        Commands::DbInit => {
            cmd_db_init(cli.database_url.as_deref()).await?;
        }
        Commands::Serve {
            bind,
            port,
            in_memory,
        } => {
            let resolved = GradmateConfig::resolve(cli.database_url.as_deref())?;
            let bind = bind.unwrap_or_else(|| resolved.server.bind.clone());
            let port = port.unwrap_or(resolved.server.port);

            if in_memory {
                tracing::warn!("serving from an in-memory store; data is lost on exit");
                let (manager, assist) =
                    build_services(Arc::new(MemoryPlanStore::new()), &resolved)?;
                let state =
                    serve_cmd::AppState::new(manager, assist, &resolved.server.user_header)?;
                serve_cmd::run_serve(state, &bind, port).await?;
            } else {
                let db_pool = pool::create_pool(&resolved.db_config).await?;
                let (manager, assist) =
                    build_services(Arc::new(PgPlanStore::new(db_pool.clone())), &resolved)?;
                let state =
                    serve_cmd::AppState::new(manager, assist, &resolved.server.user_header)?;
                let result = serve_cmd::run_serve(state, &bind, port).await;
                db_pool.close().await;
                result?;
            }
        }
        Commands::Tasks { command } => {
            let resolved = GradmateConfig::resolve(cli.database_url.as_deref())?;
            let db_pool = pool::create_pool(&resolved.db_config).await?;
            let (manager, _) =
                build_services(Arc::new(PgPlanStore::new(db_pool.clone())), &resolved)?;
            let result = tasks_cmd::run_task_command(command, &manager).await;
            db_pool.close().await;
            result?;
        }
        Commands::Usage { user, limit } => {
            let resolved = GradmateConfig::resolve(cli.database_url.as_deref())?;
            let db_pool = pool::create_pool(&resolved.db_config).await?;
            let result = usage_cmd::run_usage(&db_pool, &user, limit).await;
            db_pool.close().await;
            result?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod test_util {
    use std::sync::{Mutex, MutexGuard};

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    /// Serialize tests that touch process environment variables.
    pub fn lock_env() -> MutexGuard<'static, ()> {
        ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_task_subcommands() {
        let cli = Cli::try_parse_from([
            "gradmate",
            "tasks",
            "add",
            "--user",
            "u1",
            "Read Ch1",
            "--due",
            "2025-01-02",
        ])
        .unwrap();
        match cli.command {
            Commands::Tasks {
                command: TaskCommands::Add { user, title, due, plan_title },
            } => {
                assert_eq!(user, "u1");
                assert_eq!(title, "Read Ch1");
                assert_eq!(due.as_deref(), Some("2025-01-02"));
                assert_eq!(plan_title, None);
            }
            _ => panic!("expected tasks add"),
        }
    }

    #[test]
    fn serve_flags_are_optional() {
        let cli = Cli::try_parse_from(["gradmate", "serve", "--in-memory"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Serve { bind: None, port: None, in_memory: true }
        ));
    }
}
