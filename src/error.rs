// src/error.rs
//! Ошибки конвейера построения карты
//!
//! Каждый запрос возвращает собственный `Result<Artifact, MapError>`.
//! Ошибки выбора различаются по варианту; всё, что ломается при
//! отрисовке или записи файла, сводится к `Render` с исходным сообщением.

use thiserror::Error;

use crate::artifact::ArtifactError;
use crate::basemap::BasemapError;
use crate::boundary::AdminLevel;
use crate::config::ConfigError;
use crate::extent::ExtentError;

#[derive(Debug, Error)]
pub enum MapError {
    /// Не выбран ни один уровень
    #[error("Please select a study area.")]
    NoSelection,

    /// Выбранное имя отсутствует в наборе своего уровня
    #[error("No geometry to display: no {level} named '{name}'.")]
    NoGeometry { level: AdminLevel, name: String },

    /// Выбор не согласован с иерархией (только при явной проверке)
    #[error("'{name}' is not a {level} inside the selected parent areas.")]
    HierarchyMismatch { level: AdminLevel, name: String },

    /// Любая ошибка отрисовки или записи артефакта
    #[error("{0}")]
    Render(String),
}

impl From<BasemapError> for MapError {
    fn from(e: BasemapError) -> Self {
        MapError::Render(e.to_string())
    }
}

impl From<ExtentError> for MapError {
    fn from(e: ExtentError) -> Self {
        MapError::Render(e.to_string())
    }
}

impl From<ArtifactError> for MapError {
    fn from(e: ArtifactError) -> Self {
        MapError::Render(e.to_string())
    }
}

impl From<ConfigError> for MapError {
    fn from(e: ConfigError) -> Self {
        MapError::Render(e.to_string())
    }
}
