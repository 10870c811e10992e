// src/config.rs
//! Конфигурация генератора карт
//!
//! Этот модуль определяет все параметры, управляющие построением карты:
//! - Пути к наборам административных границ и справочным слоям
//! - Размер и разрешение итогового изображения
//! - Источники и уровни масштаба подложки
//! - Оформление (цвета, толщины линий, шрифт)
//! - Экстенты континентов для врезки
//!
//! Все структуры поддерживают сериализацию в TOML/JSON для удобной настройки через конфигурационные файлы.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::extent::Extent;

/// Ошибки загрузки конфигурации
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid color '{0}', expected \"#rrggbb\"")]
    Color(String),

    #[error("Failed to load font {path}: {reason}")]
    Font { path: PathBuf, reason: String },

    #[error("No font found: set style.font_path or enable style.system_fonts")]
    NoFont,
}

/// Пути к исходным данным
///
/// Четыре уровня административного деления (GADM-подобный GeoJSON)
/// и необязательные справочные слои.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DataSettings {
    /// Уровень 0 — страны (атрибут `COUNTRY`)
    #[serde(default)]
    pub level0: Option<PathBuf>,

    /// Уровень 1 — регионы (атрибут `NAME_1`)
    #[serde(default)]
    pub level1: Option<PathBuf>,

    /// Уровень 2 — департаменты (атрибут `NAME_2`)
    #[serde(default)]
    pub level2: Option<PathBuf>,

    /// Уровень 3 — коммуны (атрибут `NAME_3`)
    #[serde(default)]
    pub level3: Option<PathBuf>,

    /// Государственные границы. Если не задано, берутся контуры уровня 0.
    #[serde(default)]
    pub borders: Option<PathBuf>,

    /// Береговая линия. Если не задано, не рисуется.
    #[serde(default)]
    pub coastlines: Option<PathBuf>,
}

impl DataSettings {
    /// Пути уровней 0..=3 в порядке возрастания детализации
    #[must_use]
    pub fn levels(&self) -> [Option<&Path>; 4] {
        [
            self.level0.as_deref(),
            self.level1.as_deref(),
            self.level2.as_deref(),
            self.level3.as_deref(),
        ]
    }

    /// Делает относительные пути абсолютными относительно каталога конфигурации
    pub fn resolve_relative_to(&mut self, base: &Path) {
        for path in [
            &mut self.level0,
            &mut self.level1,
            &mut self.level2,
            &mut self.level3,
            &mut self.borders,
            &mut self.coastlines,
        ]
        .into_iter()
        .flatten()
        {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }
}

/// Размер фигуры
///
/// Итоговое изображение имеет `width_in × dpi` на `height_in × dpi` пикселей
/// до обрезки по содержимому.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FigureSettings {
    /// Ширина фигуры в дюймах
    #[serde(default = "default_width_in")]
    pub width_in: f64,

    /// Высота фигуры в дюймах
    #[serde(default = "default_height_in")]
    pub height_in: f64,

    /// Разрешение (точек на дюйм)
    #[serde(default = "default_dpi")]
    pub dpi: u32,
}

fn default_width_in() -> f64 {
    12.0
}
fn default_height_in() -> f64 {
    8.0
}
fn default_dpi() -> u32 {
    150
}

impl FigureSettings {
    /// Размер фигуры в пикселях
    #[must_use]
    pub fn pixel_size(&self) -> (u32, u32) {
        let dpi = f64::from(self.dpi);
        (
            (self.width_in * dpi).round().max(1.0) as u32,
            (self.height_in * dpi).round().max(1.0) as u32,
        )
    }

    /// Пикселей на типографский пункт (1/72 дюйма)
    #[must_use]
    pub fn px_per_pt(&self) -> f32 {
        self.dpi as f32 / 72.0
    }
}

impl Default for FigureSettings {
    fn default() -> Self {
        Self {
            width_in: 12.0,
            height_in: 8.0,
            dpi: 150,
        }
    }
}

/// Настройки тайловой подложки
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BasemapSettings {
    /// Уровень масштаба тайлов основной карты
    #[serde(default = "default_main_zoom")]
    pub main_zoom: u8,

    /// Уровень масштаба тайлов врезки (континент целиком)
    #[serde(default = "default_inset_zoom")]
    pub inset_zoom: u8,

    /// Максимум тайлов на один слой (защита от случайного огромного запроса)
    #[serde(default = "default_max_tiles")]
    pub max_tiles: usize,

    /// Таймаут HTTP-запроса в секундах
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Заголовок User-Agent (OSM отклоняет запросы без него)
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Шаблон URL стандартной подложки: `{x}`, `{y}`, `{z}`
    #[serde(default = "default_standard_url")]
    pub standard_url: String,

    /// Шаблон URL спутниковой гибридной подложки: `{x}`, `{y}`, `{z}`
    #[serde(default = "default_hybrid_url")]
    pub hybrid_url: String,
}

fn default_main_zoom() -> u8 {
    7
}
fn default_inset_zoom() -> u8 {
    2
}
fn default_max_tiles() -> usize {
    400
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_user_agent() -> String {
    concat!("studymap/", env!("CARGO_PKG_VERSION")).to_string()
}
fn default_standard_url() -> String {
    "https://tile.openstreetmap.org/{z}/{x}/{y}.png".to_string()
}
fn default_hybrid_url() -> String {
    "https://mt1.google.com/vt/lyrs=y&x={x}&y={y}&z={z}".to_string()
}

impl Default for BasemapSettings {
    fn default() -> Self {
        Self {
            main_zoom: default_main_zoom(),
            inset_zoom: default_inset_zoom(),
            max_tiles: default_max_tiles(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
            standard_url: default_standard_url(),
            hybrid_url: default_hybrid_url(),
        }
    }
}

/// Оформление карты
///
/// Толщины линий и размеры шрифтов задаются в пунктах и пересчитываются
/// в пиксели через `dpi`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StyleSettings {
    /// Цвет контура выбранной территории
    #[serde(default = "default_outline_color")]
    pub outline_color: String,

    /// Толщина контура выбранной территории (пт)
    #[serde(default = "default_outline_width")]
    pub outline_width: f32,

    /// Толщина береговой линии (пт)
    #[serde(default = "default_coastline_width")]
    pub coastline_width: f32,

    /// Размер шрифта подписи территории (пт)
    #[serde(default = "default_label_size")]
    pub label_size: f32,

    /// Размер шрифта заголовка (пт)
    #[serde(default = "default_title_size")]
    pub title_size: f32,

    /// Размер буквы «N» у стрелки севера (пт)
    #[serde(default = "default_north_size")]
    pub north_size: f32,

    /// Явный путь к TrueType-шрифту
    #[serde(default)]
    pub font_path: Option<PathBuf>,

    /// Искать шрифт в стандартных системных каталогах, если `font_path` не задан
    #[serde(default = "default_system_fonts")]
    pub system_fonts: bool,
}

fn default_outline_color() -> String {
    "#ff0000".to_string()
}
fn default_outline_width() -> f32 {
    2.0
}
fn default_coastline_width() -> f32 {
    0.5
}
fn default_label_size() -> f32 {
    9.0
}
fn default_title_size() -> f32 {
    13.0
}
fn default_north_size() -> f32 {
    12.0
}
fn default_system_fonts() -> bool {
    true
}

impl Default for StyleSettings {
    fn default() -> Self {
        Self {
            outline_color: default_outline_color(),
            outline_width: 2.0,
            coastline_width: 0.5,
            label_size: 9.0,
            title_size: 13.0,
            north_size: 12.0,
            font_path: None,
            system_fonts: true,
        }
    }
}

/// Настройки врезки
///
/// Врезка всегда показывает континент, на котором лежит выбранная страна.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InsetSettings {
    /// Континент для стран, отсутствующих в `country_continents`
    #[serde(default = "default_continent")]
    pub default_continent: String,

    /// Экстенты континентов: `[min_lon, max_lon, min_lat, max_lat]`
    #[serde(default = "default_continents")]
    pub continents: BTreeMap<String, Extent>,

    /// Страна → континент
    #[serde(default = "default_country_continents")]
    pub country_continents: BTreeMap<String, String>,
}

fn default_continent() -> String {
    "Africa".to_string()
}
fn default_continents() -> BTreeMap<String, Extent> {
    BTreeMap::from([("Africa".to_string(), Extent::new(-20.0, 55.0, -35.0, 37.0))])
}
fn default_country_continents() -> BTreeMap<String, String> {
    BTreeMap::from([("Niger".to_string(), "Africa".to_string())])
}

impl InsetSettings {
    /// Экстент континента, содержащего страну
    ///
    /// Возвращает `None`, если континент не описан в `continents`.
    #[must_use]
    pub fn continent_extent(&self, country: &str) -> Option<(&str, Extent)> {
        let name = self
            .country_continents
            .get(country)
            .unwrap_or(&self.default_continent);
        self.continents
            .get(name)
            .map(|extent| (name.as_str(), *extent))
    }
}

impl Default for InsetSettings {
    fn default() -> Self {
        Self {
            default_continent: default_continent(),
            continents: default_continents(),
            country_continents: default_country_continents(),
        }
    }
}

/// Куда сохраняются артефакты
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutputSettings {
    /// Каталог артефактов (создаётся при необходимости)
    #[serde(default = "default_output_directory")]
    pub directory: PathBuf,

    /// Префикс имени файла; к нему добавляется идентификатор запроса
    #[serde(default = "default_file_stem")]
    pub file_stem: String,
}

fn default_output_directory() -> PathBuf {
    std::env::temp_dir().join("study_area_app")
}
fn default_file_stem() -> String {
    "map_preview".to_string()
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            directory: default_output_directory(),
            file_stem: default_file_stem(),
        }
    }
}

/// Полная конфигурация генератора
///
/// Поддерживает загрузку из TOML-файлов; любой раздел можно опустить.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MapConfig {
    #[serde(default)]
    pub data: DataSettings,

    #[serde(default)]
    pub figure: FigureSettings,

    #[serde(default)]
    pub basemap: BasemapSettings,

    #[serde(default)]
    pub style: StyleSettings,

    #[serde(default)]
    pub inset: InsetSettings,

    #[serde(default)]
    pub output: OutputSettings,
}

impl MapConfig {
    /// Загружает конфигурацию из TOML-файла
    ///
    /// Относительные пути в разделе `[data]` отсчитываются от каталога файла.
    ///
    /// # Пример
    /// ```toml
    /// # niger.toml
    /// [data]
    /// level0 = "gadm41_NER_0.json"
    /// level1 = "gadm41_NER_1.json"
    ///
    /// [figure]
    /// dpi = 150
    /// ```
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: Self = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        if let Some(base) = path.parent() {
            config.data.resolve_relative_to(base);
        }
        Ok(config)
    }
}

/// Разбирает цвет `"#rrggbb"` в RGBA (непрозрачный)
pub fn parse_hex_color(hex: &str) -> Result<image::Rgba<u8>, ConfigError> {
    let digits = hex
        .strip_prefix('#')
        .filter(|d| d.len() == 6 && d.is_ascii())
        .ok_or_else(|| ConfigError::Color(hex.to_string()))?;
    let channel = |i: usize| {
        u8::from_str_radix(&digits[i..i + 2], 16).map_err(|_| ConfigError::Color(hex.to_string()))
    };
    Ok(image::Rgba([channel(0)?, channel(2)?, channel(4)?, 255]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_gives_defaults() {
        let config: MapConfig = toml::from_str("").unwrap();
        assert_eq!(config.figure, FigureSettings::default());
        assert_eq!(config.figure.pixel_size(), (1800, 1200));
        assert_eq!(config.basemap.main_zoom, 7);
        assert_eq!(config.basemap.inset_zoom, 2);
        assert_eq!(config.output.file_stem, "map_preview");
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config: MapConfig = toml::from_str(
            r#"
            [figure]
            dpi = 72

            [inset.continents]
            Asia = [25.0, 180.0, -12.0, 82.0]
            "#,
        )
        .unwrap();
        assert_eq!(config.figure.dpi, 72);
        assert!((config.figure.width_in - 12.0).abs() < f64::EPSILON);
        assert!(config.inset.continents.contains_key("Asia"));
        assert!(!config.inset.continents.contains_key("Africa"));
    }

    #[test]
    fn niger_lies_in_africa() {
        let inset = InsetSettings::default();
        let (name, extent) = inset.continent_extent("Niger").unwrap();
        assert_eq!(name, "Africa");
        assert_eq!(extent, Extent::new(-20.0, 55.0, -35.0, 37.0));
        // неизвестная страна — континент по умолчанию
        assert_eq!(inset.continent_extent("Mali").unwrap().0, "Africa");
    }

    #[test]
    fn relative_data_paths_follow_config_dir() {
        let mut data = DataSettings {
            level0: Some(PathBuf::from("gadm41_NER_0.json")),
            borders: Some(PathBuf::from("/abs/borders.json")),
            ..DataSettings::default()
        };
        data.resolve_relative_to(Path::new("/srv/maps"));
        assert_eq!(
            data.level0.as_deref(),
            Some(Path::new("/srv/maps/gadm41_NER_0.json"))
        );
        assert_eq!(data.borders.as_deref(), Some(Path::new("/abs/borders.json")));
    }

    #[test]
    fn hex_colors() {
        assert_eq!(
            parse_hex_color("#ff0000").unwrap(),
            image::Rgba([255, 0, 0, 255])
        );
        assert!(parse_hex_color("red").is_err());
        assert!(parse_hex_color("#ff00").is_err());
        assert!(parse_hex_color("#gg0000").is_err());
    }
}
