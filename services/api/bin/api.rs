//! Main Entrypoint for the Mentor API Service
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Initializing the database connection pool and running migrations.
//! 3. Initializing shared services (LLM client, prompt generator, experts).
//! 4. Constructing the Axum router and applying middleware.
//! 5. Starting the web server and handling graceful shutdown.

use anyhow::Context;
use async_openai::config::OpenAIConfig;
use mentor_api::{config::Config, db::Db, router::create_router, state::AppState};
use mentor_core::{
    experts::{
        ExpertRegistry, career::CareerConsultant, interview::InterviewExpert,
        progress::ProgressAnalyst, teacher::TeacherExpert, test_expert::TestExpert,
    },
    llm_client::{LLMClient, OpenAICompatibleClient},
    orchestrator::TurnProcessor,
    prompt::{PromptGenerator, TemplatePromptGenerator},
    repo::{ChatRepo, ContentRepo, StudentRepo},
    session::InMemoryTestSessionStore,
};
use sqlx::PgPool;
use std::{collections::HashMap, fs, sync::Arc};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

/// Listens for the `Ctrl+C` signal to gracefully shut down the server.
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    info!("Received shutdown signal. Shutting down gracefully...");
}

/// A helper function to load prompt templates from a directory.
fn load_prompts(prompts_path: &std::path::Path) -> anyhow::Result<HashMap<String, String>> {
    let mut prompts = HashMap::new();
    for entry in std::fs::read_dir(prompts_path)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("md") {
            let prompt_key = path
                .file_stem()
                .and_then(|s| s.to_str())
                .context("Could not get file stem")?
                .to_string();
            let content = fs::read_to_string(&path)?;
            prompts.insert(prompt_key, content);
        }
    }
    Ok(prompts)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();
    info!("Configuration loaded. Initializing application state...");

    // --- 3. Initialize Database ---
    let pool = PgPool::connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    let db = Arc::new(Db::new(pool));
    db.run_migrations().await?;
    info!("Database connection established and migrations are up-to-date.");

    // --- 4. Initialize Shared Services ---
    let templates = load_prompts(&config.prompts_path)?;
    let prompts: Arc<dyn PromptGenerator> = Arc::new(TemplatePromptGenerator::new(templates));

    let openai_config = OpenAIConfig::new()
        .with_api_key(&config.llm_api_key)
        .with_api_base(&config.llm_api_base);
    let llm_client: Arc<dyn LLMClient> = Arc::new(OpenAICompatibleClient::new(
        openai_config,
        config.chat_model.clone(),
    ));

    let students: Arc<dyn StudentRepo> = db.clone();
    let chats: Arc<dyn ChatRepo> = db.clone();
    let content: Arc<dyn ContentRepo> = db.clone();
    let test_sessions = Arc::new(InMemoryTestSessionStore::new());

    let registry = ExpertRegistry::new(vec![
        Arc::new(InterviewExpert::new(
            chats.clone(),
            content.clone(),
            llm_client.clone(),
            prompts.clone(),
        )),
        Arc::new(TeacherExpert::new(content.clone())),
        Arc::new(TestExpert::new(
            test_sessions,
            content,
            llm_client.clone(),
            prompts.clone(),
        )),
        Arc::new(CareerConsultant::new()),
        Arc::new(ProgressAnalyst::new()),
    ])?;

    let turns = Arc::new(TurnProcessor::new(
        students.clone(),
        chats,
        llm_client,
        prompts,
        registry,
    ));

    let app_state = AppState {
        students,
        turns,
        config: Arc::new(config.clone()),
    };

    // --- 5. Create Router and Apply Middleware ---
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(app_state).layer(cors);

    // --- 6. Start Server ---
    info!(
        model = %config.chat_model,
        bind_address = %config.bind_address,
        "Service configured. Starting server..."
    );
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server has shut down.");
    Ok(())
}
