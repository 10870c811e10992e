//! Источники тайлов
//!
//! Оба источника используют обычную схему XYZ и отличаются только
//! шаблоном URL и допустимыми уровнями масштаба.

use crate::coord::{MAX_ZOOM, TileCoord};

/// Источник тайлов подложки
pub trait TileProvider: Send + Sync {
    /// Имя для логов
    fn name(&self) -> &str;

    /// URL тайла
    fn tile_url(&self, tile: &TileCoord) -> String;

    fn min_zoom(&self) -> u8 {
        0
    }

    fn max_zoom(&self) -> u8;

    fn supports_zoom(&self, zoom: u8) -> bool {
        zoom >= self.min_zoom() && zoom <= self.max_zoom()
    }
}

/// Подставляет координаты тайла в шаблон вида `.../{z}/{x}/{y}.png`
#[must_use]
pub fn fill_template(template: &str, tile: &TileCoord) -> String {
    template
        .replace("{x}", &tile.x.to_string())
        .replace("{y}", &tile.y.to_string())
        .replace("{z}", &tile.z.to_string())
}

/// Стандартная открытая подложка (OpenStreetMap)
///
/// Используется для основной карты по выбору и всегда для врезки.
#[derive(Debug, Clone)]
pub struct StandardTileProvider {
    template: String,
}

impl StandardTileProvider {
    #[must_use]
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }
}

impl TileProvider for StandardTileProvider {
    fn name(&self) -> &str {
        "OSM"
    }

    fn tile_url(&self, tile: &TileCoord) -> String {
        fill_template(&self.template, tile)
    }

    fn max_zoom(&self) -> u8 {
        19
    }
}

/// Спутниковая гибридная подложка (снимки + подписи)
///
/// URL строится из фиксированного шаблона хоста по координатам тайла.
#[derive(Debug, Clone)]
pub struct SatelliteHybridTileProvider {
    template: String,
}

impl SatelliteHybridTileProvider {
    #[must_use]
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }
}

impl TileProvider for SatelliteHybridTileProvider {
    fn name(&self) -> &str {
        "Google Hybrid"
    }

    fn tile_url(&self, tile: &TileCoord) -> String {
        fill_template(&self.template, tile)
    }

    fn max_zoom(&self) -> u8 {
        MAX_ZOOM
    }
}
