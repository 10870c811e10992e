//! Общие заготовки для интеграционных тестов: набор границ в памяти
//! и HTTP-клиент, отдающий сгенерированные PNG-тайлы.

#![allow(dead_code)]

use geo::{MultiPolygon, polygon};
use image::{ImageOutputFormat, Rgba, RgbaImage};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use studymap::basemap::BasemapError;
use studymap::{AdminLevel, AdministrativeUnit, BoundaryDataset, HttpClient, MapConfig, ReferenceLayers};

/// Тайлы с цветом, зависящим только от URL
#[derive(Default)]
pub struct MockTiles {
    pub requested: Mutex<Vec<String>>,
}

impl MockTiles {
    pub fn urls(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

pub fn png_tile(color: Rgba<u8>) -> Vec<u8> {
    let tile = RgbaImage::from_pixel(256, 256, color);
    let mut bytes = Vec::new();
    tile.write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Png)
        .unwrap();
    bytes
}

impl HttpClient for MockTiles {
    fn get(&self, url: &str) -> Result<Vec<u8>, BasemapError> {
        self.requested.lock().unwrap().push(url.to_string());
        let sum: u32 = url.bytes().map(u32::from).sum();
        let shade = |k: u32| (40 + (sum * k) % 150) as u8;
        Ok(png_tile(Rgba([shade(3), shade(7), shade(11), 255])))
    }
}

/// Клиент без сети: любой запрос — ошибка
pub struct Offline;

impl HttpClient for Offline {
    fn get(&self, url: &str) -> Result<Vec<u8>, BasemapError> {
        Err(BasemapError::Http(format!("HTTP 503 from {url}")))
    }
}

fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> MultiPolygon<f64> {
    MultiPolygon::new(vec![polygon![
        (x: x0, y: y0), (x: x1, y: y0), (x: x1, y: y1), (x: x0, y: y1), (x: x0, y: y0),
    ]])
}

fn unit(level: AdminLevel, name: &str, parents: &[&str], geometry: MultiPolygon<f64>) -> AdministrativeUnit {
    AdministrativeUnit {
        level,
        name: name.to_string(),
        parents: parents.iter().map(|p| (*p).to_string()).collect(),
        geometry,
    }
}

/// Упрощённый Нигер: страна, два региона, департамент, коммуна и сосед
pub fn niger_dataset() -> BoundaryDataset {
    BoundaryDataset::new(
        vec![
            unit(AdminLevel::Country, "Niger", &[], rect(0.16, 11.7, 16.0, 23.5)),
            unit(AdminLevel::Country, "Mali", &[], rect(-12.2, 10.1, 4.2, 25.0)),
            unit(AdminLevel::Region, "Tahoua", &["Niger"], rect(3.0, 13.8, 6.5, 18.5)),
            unit(AdminLevel::Region, "Tillabéri", &["Niger"], rect(0.16, 11.7, 4.0, 16.0)),
            unit(
                AdminLevel::Department,
                "Illéla",
                &["Niger", "Tahoua"],
                rect(4.8, 14.0, 5.9, 14.9),
            ),
            unit(
                AdminLevel::Municipality,
                "Badaguichiri",
                &["Niger", "Tahoua", "Illéla"],
                rect(5.2, 14.3, 5.6, 14.7),
            ),
        ],
        ReferenceLayers::default(),
    )
}

/// Шрифт подписей, лежащий рядом с тестами
pub fn fixture_font_path() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/DejaVuSans.ttf")
}

/// Небольшая фигура, низкие масштабы, адреса тайлов `mock://`, шрифт из fixtures
pub fn test_config(output: &Path) -> MapConfig {
    let mut config = MapConfig::default();
    config.figure.dpi = 40;
    config.basemap.main_zoom = 5;
    config.basemap.inset_zoom = 1;
    config.basemap.standard_url = "mock://osm/{z}/{x}/{y}.png".to_string();
    config.basemap.hybrid_url = "mock://hybrid?x={x}&y={y}&z={z}".to_string();
    config.style.system_fonts = false;
    config.style.font_path = Some(fixture_font_path());
    config.output.directory = output.to_path_buf();
    config
}
