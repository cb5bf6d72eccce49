pub(crate) mod api;
pub(crate) mod core;
pub(crate) mod db;
pub(crate) mod repositories;
pub(crate) mod schemas;
pub(crate) mod services;

#[cfg(test)]
mod test_support;

use crate::core::{config::Settings, state::AppState, telemetry};
use crate::services::parent_chat::ParentChatService;
use crate::services::vision_ocr::VisionOcrService;

pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::load()?;
    telemetry::init_tracing(&settings)?;
    core::metrics::init(&settings)?;

    let db_pool = db::init_pool(&settings).await?;
    db::run_migrations(&db_pool).await?;

    let ocr = VisionOcrService::from_settings(settings.vision())?;
    if !ocr.is_configured() {
        tracing::warn!("GCV_API_KEY is not set; alphabet checks will fail until it is configured");
    }
    let chat = ParentChatService::from_settings(settings.chat())?;

    let state = AppState::new(settings, db_pool, ocr, chat);
    let app = api::router::router(state.clone());
    let listener = tokio::net::TcpListener::bind(state.settings().server_addr()).await?;

    tracing::info!(
        host = %state.settings().server_host(),
        port = state.settings().server_port(),
        environment = %state.settings().runtime().environment.as_str(),
        basic_auth = state.settings().admin().basic_auth_enabled,
        "Alphabet Mastery API listening"
    );

    axum::serve(listener, app).with_graceful_shutdown(core::shutdown::shutdown_signal()).await?;

    tracing::info!("server stopped");
    Ok(())
}
