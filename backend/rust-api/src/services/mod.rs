use axum_extra::extract::cookie::Key;
use sha2::{Digest, Sha512};
use std::sync::Arc;

use crate::config::{Config, SessionBackend};

pub mod generation_client;
pub mod grader;
pub mod quiz_generator;
pub mod report_pdf;
pub mod scorecard;
pub mod session_locks;
pub mod session_store;

use generation_client::{GeminiClient, GenerationClient};
use report_pdf::PdfFonts;
use scorecard::ScorecardFonts;
use session_locks::SessionLocks;
use session_store::{MemorySessionStore, RedisSessionStore, SessionStore};

pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn SessionStore>,
    pub generator: Arc<dyn GenerationClient>,
    pub session_locks: SessionLocks,
    pub fonts: ScorecardFonts,
    pub pdf_fonts: PdfFonts,
    pub cookie_key: Key,
}

impl AppState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let store: Arc<dyn SessionStore> = match config.session.backend {
            SessionBackend::Redis => Arc::new(
                RedisSessionStore::connect(&config.session.redis_uri, config.session.ttl_seconds)
                    .await?,
            ),
            SessionBackend::Memory => {
                tracing::warn!("Using in-memory session store; sessions are lost on restart");
                Arc::new(MemorySessionStore::new(config.session.ttl_seconds))
            }
        };

        if config.gemini.api_key.is_empty() {
            tracing::warn!("GEMINI_API_KEY is not set; quiz generation will fail");
        }
        let generator: Arc<dyn GenerationClient> = Arc::new(GeminiClient::new(&config.gemini)?);

        Ok(Self::with_components(config, store, generator))
    }

    /// Builds the state around already constructed collaborators.
    pub fn with_components(
        config: Config,
        store: Arc<dyn SessionStore>,
        generator: Arc<dyn GenerationClient>,
    ) -> Self {
        let fonts = ScorecardFonts::load(
            &config.report.regular_font_path,
            &config.report.bold_font_path,
        );
        let pdf_fonts = PdfFonts::load(
            &config.report.regular_font_path,
            &config.report.bold_font_path,
        );
        let cookie_key = derive_cookie_key(&config.session.secret_key);

        Self {
            config,
            store,
            generator,
            session_locks: SessionLocks::new(),
            fonts,
            pdf_fonts,
            cookie_key,
        }
    }
}

/// Stretches the configured secret to the 64 bytes a signing key needs.
pub fn derive_cookie_key(secret: &str) -> Key {
    let digest = Sha512::digest(secret.as_bytes());
    Key::from(digest.as_slice())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cookie_key_is_deterministic_per_secret() {
        let a = derive_cookie_key("secret-one");
        let b = derive_cookie_key("secret-one");
        let c = derive_cookie_key("secret-two");
        assert_eq!(a.master(), b.master());
        assert_ne!(a.master(), c.master());
    }
}
