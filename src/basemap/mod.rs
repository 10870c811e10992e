//! Тайловая подложка
//!
//! Подложка — мозаика тайлов XYZ, покрывающая экстент вида. Для основной
//! карты источник выбирается запросом (`BasemapSource`), врезка всегда
//! строится на стандартном источнике с низким масштабом.
//!
//! Загрузка блокирующая. Любая сетевая ошибка, статус не 2xx или
//! нечитаемый тайл прерывает построение карты: пустые тайлы не
//! подставляются, повторов нет.

pub mod http;
pub mod provider;

use image::{RgbaImage, imageops};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::BasemapSettings;
use crate::coord::{TILE_SIZE, TileCoord, to_global_pixel, to_tile_coords};
use crate::extent::Extent;

pub use http::{HttpClient, UreqClient};
pub use provider::{SatelliteHybridTileProvider, StandardTileProvider, TileProvider};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BasemapError {
    #[error("Tile download failed: {0}")]
    Http(String),

    #[error("Invalid tile {tile:?}: {reason}")]
    InvalidTile { tile: TileCoord, reason: String },

    #[error("Zoom level {zoom} not supported by {provider}")]
    UnsupportedZoom { provider: String, zoom: u8 },

    #[error("Basemap layer needs {count} tiles, limit is {limit}")]
    TooManyTiles { count: usize, limit: usize },
}

/// Источник подложки основной карты
///
/// Закрытый набор вариантов; новый источник добавляется новым вариантом.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BasemapSource {
    #[default]
    #[serde(rename = "OSM")]
    Osm,
    #[serde(rename = "Google Hybrid")]
    GoogleHybrid,
}

impl BasemapSource {
    /// Поставщик тайлов для основной карты
    #[must_use]
    pub fn provider(self, settings: &BasemapSettings) -> Box<dyn TileProvider> {
        match self {
            BasemapSource::Osm => Box::new(StandardTileProvider::new(&settings.standard_url)),
            BasemapSource::GoogleHybrid => {
                Box::new(SatelliteHybridTileProvider::new(&settings.hybrid_url))
            }
        }
    }
}

impl fmt::Display for BasemapSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BasemapSource::Osm => write!(f, "OSM"),
            BasemapSource::GoogleHybrid => write!(f, "Google Hybrid"),
        }
    }
}

impl FromStr for BasemapSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(['-', '_'], " ").trim() {
            "osm" | "openstreetmap" => Ok(BasemapSource::Osm),
            "google hybrid" | "hybrid" => Ok(BasemapSource::GoogleHybrid),
            _ => Err(format!(
                "Unknown basemap '{s}'. Use 'OSM' or 'Google Hybrid'."
            )),
        }
    }
}

/// Мозаика тайлов одного уровня масштаба
#[derive(Debug, Clone)]
pub struct TileLayer {
    pub zoom: u8,
    /// Левый верхний тайл мозаики
    pub origin: TileCoord,
    pub image: RgbaImage,
}

impl TileLayer {
    /// Столбец мозаики для долготы (за краем берётся крайний)
    #[must_use]
    pub fn column_for(&self, lon: f64) -> u32 {
        let (px, _) = to_global_pixel(lon, 0.0, self.zoom);
        let local = px - f64::from(self.origin.x) * f64::from(TILE_SIZE);
        (local.max(0.0) as u32).min(self.image.width().saturating_sub(1))
    }

    /// Строка мозаики для широты (за краем берётся крайняя)
    #[must_use]
    pub fn row_for(&self, lat: f64) -> u32 {
        let (_, py) = to_global_pixel(0.0, lat, self.zoom);
        let local = py - f64::from(self.origin.y) * f64::from(TILE_SIZE);
        (local.max(0.0) as u32).min(self.image.height().saturating_sub(1))
    }

    /// Цвет подложки в точке (ближайший пиксель)
    #[must_use]
    pub fn sample(&self, lon: f64, lat: f64) -> image::Rgba<u8> {
        *self.image.get_pixel(self.column_for(lon), self.row_for(lat))
    }
}

/// Подложка: основной источник + стандартный для врезки
pub struct Basemap<C> {
    source: BasemapSource,
    main: Box<dyn TileProvider>,
    inset: StandardTileProvider,
    client: C,
    max_tiles: usize,
}

impl<C: HttpClient> Basemap<C> {
    #[must_use]
    pub fn new(source: BasemapSource, settings: &BasemapSettings, client: C) -> Self {
        Self {
            source,
            main: source.provider(settings),
            inset: StandardTileProvider::new(&settings.standard_url),
            client,
            max_tiles: settings.max_tiles,
        }
    }

    #[must_use]
    pub fn source(&self) -> BasemapSource {
        self.source
    }

    /// Слой основной карты из выбранного источника
    pub fn main_tile_layer(&self, extent: &Extent, zoom: u8) -> Result<TileLayer, BasemapError> {
        fetch_layer(self.main.as_ref(), &self.client, extent, zoom, self.max_tiles)
    }

    /// Слой врезки, всегда из стандартного источника
    pub fn inset_tile_layer(&self, extent: &Extent, zoom: u8) -> Result<TileLayer, BasemapError> {
        fetch_layer(&self.inset, &self.client, extent, zoom, self.max_tiles)
    }
}

/// Загружает все тайлы, покрывающие экстент, и склеивает их в мозаику
pub fn fetch_layer<C: HttpClient + ?Sized>(
    provider: &dyn TileProvider,
    client: &C,
    extent: &Extent,
    zoom: u8,
    max_tiles: usize,
) -> Result<TileLayer, BasemapError> {
    if !provider.supports_zoom(zoom) {
        return Err(BasemapError::UnsupportedZoom {
            provider: provider.name().to_string(),
            zoom,
        });
    }

    let top_left = to_tile_coords(extent.min_lon, extent.max_lat, zoom);
    let bottom_right = to_tile_coords(extent.max_lon, extent.min_lat, zoom);
    let cols = bottom_right.x - top_left.x + 1;
    let rows = bottom_right.y - top_left.y + 1;
    // на больших масштабах произведение не помещается в u32
    let count = usize::try_from(u64::from(cols) * u64::from(rows)).unwrap_or(usize::MAX);
    let too_many = BasemapError::TooManyTiles {
        count,
        limit: max_tiles,
    };
    if count > max_tiles {
        return Err(too_many);
    }
    let (Some(width), Some(height)) = (cols.checked_mul(TILE_SIZE), rows.checked_mul(TILE_SIZE))
    else {
        return Err(too_many);
    };

    info!(provider = provider.name(), zoom, count, "Загрузка тайлов подложки");
    let mut mosaic = RgbaImage::new(width, height);

    for y in top_left.y..=bottom_right.y {
        for x in top_left.x..=bottom_right.x {
            let tile = TileCoord { x, y, z: zoom };
            let url = provider.tile_url(&tile);
            debug!(%url, "Тайл");
            let bytes = client.get(&url)?;
            let mut decoded = image::load_from_memory(&bytes)
                .map_err(|e| BasemapError::InvalidTile {
                    tile,
                    reason: e.to_string(),
                })?
                .to_rgba8();
            if decoded.dimensions() != (TILE_SIZE, TILE_SIZE) {
                decoded = imageops::resize(
                    &decoded,
                    TILE_SIZE,
                    TILE_SIZE,
                    imageops::FilterType::Triangle,
                );
            }
            imageops::replace(
                &mut mosaic,
                &decoded,
                i64::from((x - top_left.x) * TILE_SIZE),
                i64::from((y - top_left.y) * TILE_SIZE),
            );
        }
    }

    Ok(TileLayer {
        zoom,
        origin: top_left,
        image: mosaic,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use std::io::Cursor;
    use std::sync::Mutex;

    /// Отдаёт тайл, цвет которого зависит от столбца; запоминает URL
    struct ColumnTiles {
        urls: Mutex<Vec<String>>,
    }

    impl ColumnTiles {
        fn new() -> Self {
            Self {
                urls: Mutex::new(Vec::new()),
            }
        }
    }

    fn png(color: Rgba<u8>, size: u32) -> Vec<u8> {
        let mut bytes = Vec::new();
        RgbaImage::from_pixel(size, size, color)
            .write_to(&mut Cursor::new(&mut bytes), image::ImageOutputFormat::Png)
            .unwrap();
        bytes
    }

    impl HttpClient for ColumnTiles {
        fn get(&self, url: &str) -> Result<Vec<u8>, BasemapError> {
            self.urls.lock().unwrap().push(url.to_string());
            let x: u8 = url.rsplit('/').nth(1).unwrap().parse().unwrap();
            Ok(png(Rgba([x, 0, 0, 255]), 256))
        }
    }

    struct Failing;

    impl HttpClient for Failing {
        fn get(&self, url: &str) -> Result<Vec<u8>, BasemapError> {
            Err(BasemapError::Http(format!("connection refused: {url}")))
        }
    }

    fn test_settings() -> BasemapSettings {
        BasemapSettings {
            standard_url: "mock://osm/{z}/{x}/{y}".to_string(),
            hybrid_url: "mock://hybrid/{z}/{x}/{y}".to_string(),
            ..BasemapSettings::default()
        }
    }

    #[test]
    fn mosaic_covers_extent_in_row_major_order() {
        let client = ColumnTiles::new();
        let basemap = Basemap::new(BasemapSource::Osm, &test_settings(), &client);
        // Нигер на масштабе 4: столбцы 8..=8, строки 6..=7
        let layer = basemap
            .main_tile_layer(&Extent::new(0.06, 16.09, 11.59, 23.62), 4)
            .unwrap();
        assert_eq!(layer.origin, TileCoord { x: 8, y: 6, z: 4 });
        assert_eq!(layer.image.dimensions(), (256, 512));
        let urls = client.urls.lock().unwrap();
        assert_eq!(*urls, vec!["mock://osm/4/8/6", "mock://osm/4/8/7"]);
        assert_eq!(layer.sample(5.0, 15.0), Rgba([8, 0, 0, 255]));
    }

    #[test]
    fn inset_always_uses_standard_source() {
        let client = ColumnTiles::new();
        let basemap = Basemap::new(BasemapSource::GoogleHybrid, &test_settings(), &client);
        basemap
            .inset_tile_layer(&Extent::new(-20.0, 55.0, -35.0, 37.0), 2)
            .unwrap();
        basemap
            .main_tile_layer(&Extent::new(1.0, 2.0, 13.0, 14.0), 2)
            .unwrap();
        let urls = client.urls.lock().unwrap();
        assert!(urls[..urls.len() - 1].iter().all(|u| u.starts_with("mock://osm/2/")));
        assert!(urls.last().unwrap().starts_with("mock://hybrid/2/"));
    }

    #[test]
    fn network_failure_propagates() {
        let basemap = Basemap::new(BasemapSource::Osm, &test_settings(), Failing);
        let err = basemap
            .main_tile_layer(&Extent::new(1.0, 2.0, 13.0, 14.0), 7)
            .unwrap_err();
        assert!(matches!(err, BasemapError::Http(ref m) if m.contains("connection refused")));
    }

    #[test]
    fn undecodable_tile_is_an_error() {
        struct Garbage;
        impl HttpClient for Garbage {
            fn get(&self, _url: &str) -> Result<Vec<u8>, BasemapError> {
                Ok(b"<html>rate limited</html>".to_vec())
            }
        }
        let basemap = Basemap::new(BasemapSource::Osm, &test_settings(), Garbage);
        assert!(matches!(
            basemap.main_tile_layer(&Extent::new(1.0, 2.0, 13.0, 14.0), 3),
            Err(BasemapError::InvalidTile { .. })
        ));
    }

    #[test]
    fn tile_limit_is_enforced() {
        let settings = BasemapSettings {
            max_tiles: 4,
            ..test_settings()
        };
        let basemap = Basemap::new(BasemapSource::Osm, &settings, Failing);
        assert!(matches!(
            basemap.main_tile_layer(&Extent::new(-20.0, 55.0, -35.0, 37.0), 6),
            Err(BasemapError::TooManyTiles { limit: 4, .. })
        ));
    }

    #[test]
    fn tile_count_at_deep_zoom_does_not_overflow() {
        // Африка на масштабе 19: около 10¹⁰ тайлов, больше u32::MAX
        let err = fetch_layer(
            &StandardTileProvider::new("mock://osm/{z}/{x}/{y}"),
            &Failing,
            &Extent::new(-20.0, 55.0, -35.0, 37.0),
            19,
            400,
        )
        .unwrap_err();
        match err {
            BasemapError::TooManyTiles { count, limit } => {
                assert_eq!(limit, 400);
                assert!(count as u64 >= u64::from(u32::MAX), "{count}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn odd_sized_tiles_are_resized() {
        struct Small;
        impl HttpClient for Small {
            fn get(&self, _url: &str) -> Result<Vec<u8>, BasemapError> {
                Ok(png(Rgba([0, 0, 255, 255]), 128))
            }
        }
        let basemap = Basemap::new(BasemapSource::Osm, &test_settings(), Small);
        let layer = basemap
            .main_tile_layer(&Extent::new(1.0, 2.0, 13.0, 14.0), 0)
            .unwrap();
        assert_eq!(layer.image.dimensions(), (256, 256));
    }

    #[test]
    fn unsupported_zoom() {
        let basemap = Basemap::new(BasemapSource::Osm, &test_settings(), Failing);
        assert!(matches!(
            basemap.main_tile_layer(&Extent::new(1.0, 2.0, 13.0, 14.0), 21),
            Err(BasemapError::UnsupportedZoom { zoom: 21, .. })
        ));
    }

    #[test]
    fn source_names() {
        assert_eq!("OSM".parse::<BasemapSource>(), Ok(BasemapSource::Osm));
        assert_eq!(
            "google-hybrid".parse::<BasemapSource>(),
            Ok(BasemapSource::GoogleHybrid)
        );
        assert_eq!(
            "Google Hybrid".parse::<BasemapSource>(),
            Ok(BasemapSource::GoogleHybrid)
        );
        assert!("bing".parse::<BasemapSource>().is_err());
        assert_eq!(BasemapSource::GoogleHybrid.to_string(), "Google Hybrid");
        assert_eq!(
            serde_json::to_string(&BasemapSource::Osm).unwrap(),
            "\"OSM\""
        );
    }
}
