// src/pipeline.rs
//! Обработка одного запроса от выбора до файла
//!
//! Состояния запроса:
//!
//! ```text
//! received → resolving → resolved | failed(no-selection) | failed(no-geometry)
//!          → composing → rendered | failed(render)
//!          → writing   → artifact-ready | failed(render)
//! ```
//!
//! Каждый переход пишется в лог с полем `state` внутри span'а запроса.
//! Результат возвращается вызывающему; общего «последнего сообщения об
//! ошибке» нет, поэтому параллельные запросы не видят чужих результатов.

use rusttype::Font;
use tracing::{debug, info, info_span, warn};

use crate::artifact::{Artifact, ArtifactWriter};
use crate::basemap::{HttpClient, UreqClient};
use crate::boundary::BoundaryDataset;
use crate::compose::MapComposer;
use crate::config::{ConfigError, MapConfig};
use crate::error::MapError;
use crate::extent::{DEFAULT_MARGIN_DEG, compute_extent};
use crate::render::text::load_font;
use crate::selection::{MapRequest, resolve, validate_hierarchy};

/// Генератор карт: неизменяемые данные, настройки и HTTP-клиент
///
/// `Sync`: один экземпляр обслуживает параллельные запросы.
pub struct MapService<C> {
    config: MapConfig,
    dataset: BoundaryDataset,
    client: C,
    font: Font<'static>,
    writer: ArtifactWriter,
    strict: bool,
}

impl MapService<UreqClient> {
    /// Сервис с сетевым клиентом из настроек `[basemap]`
    pub fn with_default_client(
        config: MapConfig,
        dataset: BoundaryDataset,
    ) -> Result<Self, ConfigError> {
        let client = UreqClient::new(&config.basemap);
        Self::new(config, dataset, client)
    }
}

impl<C: HttpClient> MapService<C> {
    /// Создаёт сервис; загружает шрифт из `[style]`
    ///
    /// # Ошибки
    /// `ConfigError::Font` или `ConfigError::NoFont`, если шрифт для подписей не загрузился.
    pub fn new(config: MapConfig, dataset: BoundaryDataset, client: C) -> Result<Self, ConfigError> {
        let font = load_font(&config.style)?;
        let writer = ArtifactWriter::new(&config.output);
        Ok(Self {
            config,
            dataset,
            client,
            font,
            writer,
            strict: false,
        })
    }

    /// Включает проверку согласованности выбора с иерархией
    #[must_use]
    pub fn with_strict_hierarchy(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    #[must_use]
    pub fn config(&self) -> &MapConfig {
        &self.config
    }

    #[must_use]
    pub fn dataset(&self) -> &BoundaryDataset {
        &self.dataset
    }

    /// Строит карту для запроса и сохраняет её в PNG
    ///
    /// # Ошибки
    /// - `NoSelection`, `NoGeometry` — выбор не разрешился
    /// - `HierarchyMismatch` — только в строгом режиме
    /// - `Render` — экстент, подложка, отрисовка или запись файла
    pub fn generate(&self, request: &MapRequest) -> Result<Artifact, MapError> {
        let request_id = request
            .request_id()
            .map_err(|e| MapError::Render(format!("Failed to identify request: {e}")))?;
        let span = info_span!("map_request", id = %request_id);
        let _guard = span.enter();

        info!(
            state = "received",
            selection = ?request.selection,
            inset = %request.inset,
            basemap = %request.basemap,
            "Запрос получен"
        );

        debug!(state = "resolving");
        if self.strict {
            validate_hierarchy(&request.selection, &self.dataset)
                .inspect_err(|e| warn!(state = "failed", error = %e, "Выбор не согласован"))?;
        }
        let resolved = resolve(&request.selection, &self.dataset).inspect_err(|e| {
            let state = match e {
                MapError::NoSelection => "failed(no-selection)",
                _ => "failed(no-geometry)",
            };
            warn!(state, error = %e, "Выбор не разрешён");
        })?;
        info!(
            state = "resolved",
            level = %resolved.level,
            label = %resolved.label,
            units = resolved.units.len(),
            "Территория найдена"
        );

        let margin = request.zoom_radius.unwrap_or(DEFAULT_MARGIN_DEG);
        let extent = compute_extent(resolved.geometries(), margin)
            .map_err(MapError::from)
            .inspect_err(|e| warn!(state = "failed(render)", error = %e, "Экстент не построен"))?;
        debug!(state = "composing", ?extent, margin);

        let composer = MapComposer::new(&self.config, &self.dataset, &self.client, &self.font);
        let composition = composer
            .compose(request, &resolved, &extent)
            .inspect_err(|e| warn!(state = "failed(render)", error = %e, "Карта не построена"))?;
        let (width, height) = composition.image.dimensions();
        info!(state = "rendered", width, height, "Карта построена");

        debug!(state = "writing");
        let artifact = self
            .writer
            .write(&composition, &request_id)
            .map_err(MapError::from)
            .inspect_err(|e| warn!(state = "failed(render)", error = %e, "Файл не записан"))?;
        info!(state = "artifact-ready", path = %artifact.path.display(), "Карта сохранена");

        Ok(artifact)
    }
}
