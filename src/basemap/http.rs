//! HTTP-клиент для загрузки тайлов
//!
//! Трейт `HttpClient` отделяет сеть от сборки подложки: в тестах
//! подставляется клиент, отдающий заранее сгенерированные тайлы.

use std::io::Read;
use std::time::Duration;
use tracing::trace;

use super::BasemapError;
use crate::config::BasemapSettings;

/// Верхняя граница размера ответа (один тайл редко больше 100 КБ)
const MAX_RESPONSE_BYTES: u64 = 16 * 1024 * 1024;

/// Синхронный HTTP GET
pub trait HttpClient: Send + Sync {
    /// Возвращает тело ответа; любой статус кроме 2xx считается ошибкой
    fn get(&self, url: &str) -> Result<Vec<u8>, BasemapError>;
}

impl<C: HttpClient + ?Sized> HttpClient for &C {
    fn get(&self, url: &str) -> Result<Vec<u8>, BasemapError> {
        (**self).get(url)
    }
}

/// Клиент на `ureq` (блокирующий)
#[derive(Clone)]
pub struct UreqClient {
    agent: ureq::Agent,
}

impl UreqClient {
    #[must_use]
    pub fn new(settings: &BasemapSettings) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .user_agent(&settings.user_agent)
            .build();
        Self { agent }
    }
}

impl HttpClient for UreqClient {
    fn get(&self, url: &str) -> Result<Vec<u8>, BasemapError> {
        trace!(url, "GET");
        let response = self.agent.get(url).call().map_err(|e| match e {
            ureq::Error::Status(code, _) => BasemapError::Http(format!("HTTP {code} from {url}")),
            ureq::Error::Transport(t) => BasemapError::Http(format!("Request to {url} failed: {t}")),
        })?;

        let mut body = Vec::new();
        response
            .into_reader()
            .take(MAX_RESPONSE_BYTES)
            .read_to_end(&mut body)
            .map_err(|e| BasemapError::Http(format!("Failed to read response from {url}: {e}")))?;
        Ok(body)
    }
}
