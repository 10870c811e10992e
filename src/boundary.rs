// src/boundary.rs
//! Наборы административных границ
//!
//! Четыре неизменяемые коллекции, по одной на уровень деления:
//! страна → регион → департамент → коммуна. Данные читаются один раз
//! при старте из GeoJSON в формате GADM и дальше только фильтруются
//! по точному совпадению имени.
//!
//! ## Формат
//!
//! - `FeatureCollection` с объектами `Polygon` или `MultiPolygon` (lon/lat)
//! - Имя уровня 0 в атрибуте `COUNTRY`, уровней 1..=3 в `NAME_n`
//! - Имена родителей берутся из тех же атрибутов (`COUNTRY`, `NAME_1`, ...)
//! - Третья координата (высота), если есть, отбрасывается
//!
//! Справочные слои (границы, береговая линия) читаются из того же формата,
//! но допускают также `LineString` / `MultiLineString`.

use geo::{Coord, LineString, MultiPolygon, Polygon};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::DataSettings;

/// Ошибки чтения наборов границ
#[derive(Debug, Error)]
pub enum DataError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid GeoJSON in {source_name}: {reason}")]
    Json { source_name: String, reason: String },

    #[error("Feature #{index} in {source_name} has no '{attribute}' attribute")]
    MissingAttribute {
        source_name: String,
        index: usize,
        attribute: &'static str,
    },

    #[error("Feature #{index} in {source_name}: unsupported geometry type '{kind}'")]
    UnsupportedGeometry {
        source_name: String,
        index: usize,
        kind: String,
    },
}

/// Уровень административного деления
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AdminLevel {
    Country = 0,
    Region = 1,
    Department = 2,
    Municipality = 3,
}

impl AdminLevel {
    /// Все уровни от общего к частному
    pub const ALL: [AdminLevel; 4] = [
        AdminLevel::Country,
        AdminLevel::Region,
        AdminLevel::Department,
        AdminLevel::Municipality,
    ];

    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Атрибут GADM, в котором хранится имя единицы этого уровня
    #[must_use]
    pub fn name_attribute(self) -> &'static str {
        match self {
            AdminLevel::Country => "COUNTRY",
            AdminLevel::Region => "NAME_1",
            AdminLevel::Department => "NAME_2",
            AdminLevel::Municipality => "NAME_3",
        }
    }

    /// Уровень выше (у страны `None`)
    #[must_use]
    pub fn parent(self) -> Option<AdminLevel> {
        match self {
            AdminLevel::Country => None,
            AdminLevel::Region => Some(AdminLevel::Country),
            AdminLevel::Department => Some(AdminLevel::Region),
            AdminLevel::Municipality => Some(AdminLevel::Department),
        }
    }

    /// Уровень ниже (у коммуны `None`)
    #[must_use]
    pub fn child(self) -> Option<AdminLevel> {
        match self {
            AdminLevel::Country => Some(AdminLevel::Region),
            AdminLevel::Region => Some(AdminLevel::Department),
            AdminLevel::Department => Some(AdminLevel::Municipality),
            AdminLevel::Municipality => None,
        }
    }
}

impl fmt::Display for AdminLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdminLevel::Country => write!(f, "country"),
            AdminLevel::Region => write!(f, "region"),
            AdminLevel::Department => write!(f, "department"),
            AdminLevel::Municipality => write!(f, "municipality"),
        }
    }
}

/// Административная единица
#[derive(Debug, Clone)]
pub struct AdministrativeUnit {
    pub level: AdminLevel,
    pub name: String,
    /// Имена родителей: `parents[i]` — единица уровня `i` (длина = `level`)
    pub parents: Vec<String>,
    /// Граница в географических координатах (x = долгота, y = широта)
    pub geometry: MultiPolygon<f64>,
}

impl AdministrativeUnit {
    /// Имя родителя указанного уровня, если он есть в данных
    #[must_use]
    pub fn parent_name(&self, level: AdminLevel) -> Option<&str> {
        self.parents.get(level.index()).map(String::as_str)
    }
}

/// Справочные линейные слои: государственные границы и береговая линия
#[derive(Debug, Clone, Default)]
pub struct ReferenceLayers {
    pub borders: Vec<LineString<f64>>,
    pub coastlines: Vec<LineString<f64>>,
}

/// Все уровни границ плюс справочные слои
///
/// Создаётся один раз и дальше только читается; безопасен для
/// одновременного чтения из нескольких потоков.
#[derive(Debug, Clone, Default)]
pub struct BoundaryDataset {
    levels: [Vec<AdministrativeUnit>; 4],
    reference: ReferenceLayers,
}

impl BoundaryDataset {
    /// Собирает набор из готовых единиц (каждая попадает в коллекцию своего уровня)
    ///
    /// Если `reference.borders` пуст, границами служат контуры единиц уровня 0.
    #[must_use]
    pub fn new(units: Vec<AdministrativeUnit>, mut reference: ReferenceLayers) -> Self {
        let mut levels: [Vec<AdministrativeUnit>; 4] = Default::default();
        for unit in units {
            levels[unit.level.index()].push(unit);
        }
        if reference.borders.is_empty() {
            reference.borders = levels[0]
                .iter()
                .flat_map(|unit| outline_rings(&unit.geometry))
                .collect();
        }
        Self { levels, reference }
    }

    /// Загружает все настроенные уровни и справочные слои
    ///
    /// Отсутствующий в конфигурации уровень остаётся пустым.
    pub fn load(settings: &DataSettings) -> Result<Self, DataError> {
        let mut units = Vec::new();
        for (level, path) in AdminLevel::ALL.into_iter().zip(settings.levels()) {
            if let Some(path) = path {
                let loaded = load_level_file(level, path)?;
                info!(%level, count = loaded.len(), path = %path.display(), "Уровень загружен");
                units.extend(loaded);
            }
        }

        let reference = ReferenceLayers {
            borders: settings
                .borders
                .as_deref()
                .map(load_lines_file)
                .transpose()?
                .unwrap_or_default(),
            coastlines: settings
                .coastlines
                .as_deref()
                .map(load_lines_file)
                .transpose()?
                .unwrap_or_default(),
        };

        Ok(Self::new(units, reference))
    }

    /// Коллекция единиц уровня
    #[must_use]
    pub fn units(&self, level: AdminLevel) -> &[AdministrativeUnit] {
        &self.levels[level.index()]
    }

    /// Единицы уровня с точно совпадающим именем
    pub fn find<'a>(
        &'a self,
        level: AdminLevel,
        name: &str,
    ) -> impl Iterator<Item = &'a AdministrativeUnit> {
        self.units(level).iter().filter(move |unit| unit.name == name)
    }

    #[must_use]
    pub fn reference(&self) -> &ReferenceLayers {
        &self.reference
    }

    /// Варианты выбора для уровня `level` внутри родителя `parent`
    ///
    /// Отсортированные уникальные имена. Для уровня 0 родитель не нужен и
    /// игнорируется; для остальных уровней без родителя список пуст.
    #[must_use]
    pub fn child_names(&self, level: AdminLevel, parent: Option<&str>) -> Vec<String> {
        let names: BTreeSet<&str> = match level.parent() {
            None => self
                .units(level)
                .iter()
                .map(|unit| unit.name.as_str())
                .collect(),
            Some(parent_level) => match parent {
                Some(parent) if !parent.is_empty() => self
                    .units(level)
                    .iter()
                    .filter(|unit| unit.parent_name(parent_level) == Some(parent))
                    .map(|unit| unit.name.as_str())
                    .collect(),
                _ => BTreeSet::new(),
            },
        };
        names.into_iter().map(str::to_string).collect()
    }
}

/// Внешние кольца и дыры мультиполигона как отдельные линии
pub fn outline_rings(geometry: &MultiPolygon<f64>) -> impl Iterator<Item = LineString<f64>> + '_ {
    geometry
        .iter()
        .flat_map(|polygon| std::iter::once(polygon.exterior()).chain(polygon.interiors()))
        .cloned()
}

// ─── GeoJSON ────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    #[serde(default)]
    properties: Option<Map<String, Value>>,
    #[serde(default)]
    geometry: Option<RawGeometry>,
}

#[derive(Debug, Deserialize)]
struct RawGeometry {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    coordinates: Value,
}

type Ring = Vec<Vec<f64>>;

fn read_file(path: &Path) -> Result<String, DataError> {
    fs::read_to_string(path).map_err(|source| DataError::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_collection(source_name: &str, text: &str) -> Result<FeatureCollection, DataError> {
    serde_json::from_str(text).map_err(|e| DataError::Json {
        source_name: source_name.to_string(),
        reason: e.to_string(),
    })
}

/// Загружает один уровень из файла
pub fn load_level_file(level: AdminLevel, path: &Path) -> Result<Vec<AdministrativeUnit>, DataError> {
    let text = read_file(path)?;
    parse_level(level, &path.display().to_string(), &text)
}

/// Разбирает один уровень из строки GeoJSON
///
/// Объекты без геометрии пропускаются.
pub fn parse_level(
    level: AdminLevel,
    source_name: &str,
    text: &str,
) -> Result<Vec<AdministrativeUnit>, DataError> {
    let collection = parse_collection(source_name, text)?;
    let mut units = Vec::with_capacity(collection.features.len());

    for (index, feature) in collection.features.into_iter().enumerate() {
        let Some(raw) = feature.geometry else {
            debug!(index, source_name, "Объект без геометрии пропущен");
            continue;
        };
        let properties = feature.properties.unwrap_or_default();
        let attribute = |attribute: &'static str| {
            properties
                .get(attribute)
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| DataError::MissingAttribute {
                    source_name: source_name.to_string(),
                    index,
                    attribute,
                })
        };

        let name = attribute(level.name_attribute())?;
        let parents = AdminLevel::ALL[..level.index()]
            .iter()
            .map(|parent| attribute(parent.name_attribute()))
            .collect::<Result<Vec<_>, _>>()?;
        let geometry = to_multipolygon(source_name, index, raw)?;

        units.push(AdministrativeUnit {
            level,
            name,
            parents,
            geometry,
        });
    }
    Ok(units)
}

/// Загружает линейный справочный слой из файла
pub fn load_lines_file(path: &Path) -> Result<Vec<LineString<f64>>, DataError> {
    let text = read_file(path)?;
    parse_lines(&path.display().to_string(), &text)
}

/// Разбирает справочный слой: линии или контуры полигонов
pub fn parse_lines(source_name: &str, text: &str) -> Result<Vec<LineString<f64>>, DataError> {
    let collection = parse_collection(source_name, text)?;
    let mut lines = Vec::new();

    for (index, feature) in collection.features.into_iter().enumerate() {
        let Some(raw) = feature.geometry else {
            continue;
        };
        match raw.kind.as_str() {
            "LineString" => {
                let coords: Ring = coordinates(source_name, raw.coordinates)?;
                lines.push(to_line(coords));
            }
            "MultiLineString" => {
                let parts: Vec<Ring> = coordinates(source_name, raw.coordinates)?;
                lines.extend(parts.into_iter().map(to_line));
            }
            _ => {
                let geometry = to_multipolygon(source_name, index, raw)?;
                lines.extend(outline_rings(&geometry));
            }
        }
    }
    Ok(lines)
}

fn coordinates<T: serde::de::DeserializeOwned>(source_name: &str, value: Value) -> Result<T, DataError> {
    serde_json::from_value(value).map_err(|e| DataError::Json {
        source_name: source_name.to_string(),
        reason: format!("bad coordinates: {e}"),
    })
}

fn to_multipolygon(
    source_name: &str,
    index: usize,
    raw: RawGeometry,
) -> Result<MultiPolygon<f64>, DataError> {
    match raw.kind.as_str() {
        "Polygon" => {
            let rings: Vec<Ring> = coordinates(source_name, raw.coordinates)?;
            Ok(MultiPolygon::new(vec![to_polygon(rings)]))
        }
        "MultiPolygon" => {
            let polygons: Vec<Vec<Ring>> = coordinates(source_name, raw.coordinates)?;
            Ok(MultiPolygon::new(polygons.into_iter().map(to_polygon).collect()))
        }
        other => Err(DataError::UnsupportedGeometry {
            source_name: source_name.to_string(),
            index,
            kind: other.to_string(),
        }),
    }
}

fn to_line(coords: Ring) -> LineString<f64> {
    coords
        .into_iter()
        .filter(|c| c.len() >= 2)
        .map(|c| Coord { x: c[0], y: c[1] })
        .collect()
}

fn to_polygon(rings: Vec<Ring>) -> Polygon<f64> {
    let mut rings = rings.into_iter().map(to_line);
    let exterior = rings.next().unwrap_or_else(|| LineString::new(vec![]));
    Polygon::new(exterior, rings.collect())
}
