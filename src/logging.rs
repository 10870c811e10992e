// src/logging.rs
//! Логирование
//!
//! Структурированные события `tracing` пишутся в stderr, чтобы stdout
//! оставался чистым для путей артефактов и списков вариантов.
//! Уровень задаётся через `RUST_LOG`; по умолчанию `info`, с `--verbose` уровень `debug`.

use std::io;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Уровень по умолчанию, если `RUST_LOG` не задан
#[must_use]
pub fn default_directive(verbose: bool) -> &'static str {
    if verbose { "debug" } else { "info" }
}

/// Устанавливает глобальный подписчик
///
/// Повторный вызов ничего не меняет: подписчик уже установлен.
pub fn init_logging(verbose: bool) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_target(false);

    // try_init: в тестах подписчик может быть уже установлен
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbose_switches_to_debug() {
        assert_eq!(default_directive(false), "info");
        assert_eq!(default_directive(true), "debug");
    }

    #[test]
    fn init_twice_is_harmless() {
        init_logging(false);
        init_logging(true);
        tracing::info!("logging initialised");
    }
}
