mod config;
mod frame;
mod quiz;
mod routes;
mod services;
mod state;

use std::process::ExitCode;

use tracing::{error, info};

use crate::config::Config;
use crate::quiz::QuestionSet;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    let questions = match &config.questions_path {
        Some(path) => QuestionSet::from_path(path),
        None => QuestionSet::builtin(),
    };
    let questions = match questions {
        Ok(questions) => questions,
        Err(e) => {
            error!(path = ?config.questions_path, error = %e, "question bank failed to load");
            return ExitCode::FAILURE;
        }
    };
    info!(questions = questions.len(), source = ?config.questions_path, "question bank loaded");

    let addr = (config.bind_addr.clone(), config.port);
    let state = state::AppState::new(config, questions);
    let app = routes::app(state);

    let listener = match tokio::net::TcpListener::bind((addr.0.as_str(), addr.1)).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(bind_addr = %addr.0, port = addr.1, error = %e, "failed to bind");
            return ExitCode::FAILURE;
        }
    };

    info!(bind_addr = %addr.0, port = addr.1, "quizroom listening");
    if let Err(e) = axum::serve(listener, app).await {
        error!(error = %e, "server failed");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
