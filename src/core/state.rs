use std::sync::Arc;

use sqlx::PgPool;

use crate::core::config::Settings;
use crate::services::parent_chat::ParentChatService;
use crate::services::vision_ocr::VisionOcrService;

#[derive(Clone)]
pub(crate) struct AppState {
    inner: Arc<InnerState>,
}

struct InnerState {
    settings: Settings,
    db: PgPool,
    ocr: VisionOcrService,
    chat: ParentChatService,
}

impl AppState {
    pub(crate) fn new(
        settings: Settings,
        db: PgPool,
        ocr: VisionOcrService,
        chat: ParentChatService,
    ) -> Self {
        Self { inner: Arc::new(InnerState { settings, db, ocr, chat }) }
    }

    pub(crate) fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    pub(crate) fn db(&self) -> &PgPool {
        &self.inner.db
    }

    pub(crate) fn ocr(&self) -> &VisionOcrService {
        &self.inner.ocr
    }

    pub(crate) fn chat(&self) -> &ParentChatService {
        &self.inner.chat
    }
}
