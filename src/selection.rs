// src/selection.rs
//! Выбор территории и запрос на построение карты
//!
//! Правило выбора: побеждает самое детальное непустое поле
//! (коммуна → департамент → регион → страна). Более общие поля при этом
//! не проверяются на согласованность; для этого есть отдельная
//! необязательная проверка `validate_hierarchy`.

use geo::MultiPolygon;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use crate::basemap::BasemapSource;
use crate::boundary::{AdminLevel, AdministrativeUnit, BoundaryDataset};
use crate::error::MapError;

/// Выбранные имена по уровням; пустая строка — уровень не выбран
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub department: String,
    #[serde(default)]
    pub municipality: String,
}

impl Selection {
    /// Выбор одной страны
    #[must_use]
    pub fn country(name: impl Into<String>) -> Self {
        Self {
            country: name.into(),
            ..Self::default()
        }
    }

    /// Поле указанного уровня
    #[must_use]
    pub fn field(&self, level: AdminLevel) -> &str {
        match level {
            AdminLevel::Country => &self.country,
            AdminLevel::Region => &self.region,
            AdminLevel::Department => &self.department,
            AdminLevel::Municipality => &self.municipality,
        }
    }

    /// Самый детальный непустой уровень и его значение
    #[must_use]
    pub fn effective_level(&self) -> Option<(AdminLevel, &str)> {
        AdminLevel::ALL
            .into_iter()
            .rev()
            .map(|level| (level, self.field(level)))
            .find(|(_, name)| !name.is_empty())
    }
}

/// Положение врезки внутри рамки основной карты
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum InsetPosition {
    #[default]
    #[serde(rename = "upper right")]
    UpperRight,
    #[serde(rename = "bottom right")]
    BottomRight,
}

impl InsetPosition {
    pub const ALL: [InsetPosition; 2] = [InsetPosition::UpperRight, InsetPosition::BottomRight];

    /// Прямоугольник `[left, bottom, width, height]` в долях рамки основной карты
    #[must_use]
    pub fn rect(self) -> [f64; 4] {
        match self {
            InsetPosition::UpperRight => [0.7, 0.6, 0.2, 0.2],
            InsetPosition::BottomRight => [0.7, 0.1, 0.2, 0.2],
        }
    }
}

impl fmt::Display for InsetPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InsetPosition::UpperRight => write!(f, "upper right"),
            InsetPosition::BottomRight => write!(f, "bottom right"),
        }
    }
}

impl FromStr for InsetPosition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(['-', '_'], " ").trim() {
            "upper right" => Ok(InsetPosition::UpperRight),
            "bottom right" | "lower right" => Ok(InsetPosition::BottomRight),
            _ => Err(format!(
                "Unknown inset position '{s}'. Use 'upper right' or 'bottom right'."
            )),
        }
    }
}

fn default_title() -> String {
    "Fig. 1 Study Area Map".to_string()
}

/// Запрос на построение одной карты
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapRequest {
    #[serde(default)]
    pub selection: Selection,

    #[serde(default)]
    pub inset: InsetPosition,

    #[serde(default = "default_title")]
    pub title: String,

    #[serde(default)]
    pub basemap: BasemapSource,

    /// Поле вокруг территории в градусах; `None` — стандартные 0.1°
    #[serde(default)]
    pub zoom_radius: Option<f64>,
}

impl MapRequest {
    #[must_use]
    pub fn new(selection: Selection) -> Self {
        Self {
            selection,
            inset: InsetPosition::default(),
            title: default_title(),
            basemap: BasemapSource::default(),
            zoom_radius: None,
        }
    }

    /// Идентификатор запроса: первые 16 hex-символов SHA-256 от его JSON
    ///
    /// Одинаковые запросы получают одинаковый идентификатор, разные получают разные.
    pub fn request_id(&self) -> serde_json::Result<String> {
        // сериализация структуры без map-полей детерминирована
        let json = serde_json::to_vec(self)?;
        Ok(Sha256::digest(&json)
            .iter()
            .take(8)
            .map(|b| format!("{b:02x}"))
            .collect())
    }
}

impl Default for MapRequest {
    fn default() -> Self {
        Self::new(Selection::default())
    }
}

/// Результат выбора: уровень, подпись и найденные единицы
#[derive(Debug, Clone)]
pub struct Resolved<'a> {
    pub level: AdminLevel,
    pub label: String,
    pub units: Vec<&'a AdministrativeUnit>,
}

impl<'a> Resolved<'a> {
    /// Геометрии найденных единиц
    pub fn geometries(&self) -> impl Iterator<Item = &'a MultiPolygon<f64>> + '_ {
        self.units.iter().map(|&unit| &unit.geometry)
    }
}

/// Находит геометрию самого детального выбранного уровня
///
/// # Ошибки
/// - `NoSelection` — все четыре поля пусты
/// - `NoGeometry` — на выбранном уровне нет единицы с таким именем
pub fn resolve<'a>(
    selection: &Selection,
    dataset: &'a BoundaryDataset,
) -> Result<Resolved<'a>, MapError> {
    let (level, name) = selection.effective_level().ok_or(MapError::NoSelection)?;
    let units: Vec<&AdministrativeUnit> = dataset.find(level, name).collect();
    debug!(%level, name, matches = units.len(), "Выбор разрешён");

    if units.is_empty() {
        return Err(MapError::NoGeometry {
            level,
            name: name.to_string(),
        });
    }

    Ok(Resolved {
        level,
        label: name.to_string(),
        units,
    })
}

/// Проверяет, что каждое выбранное имя лежит внутри выбранных родителей
///
/// Не вызывается из `resolve`: включается вызывающей стороной явно.
/// Пустые поля пропускаются; уровень страны проверять не с чем.
pub fn validate_hierarchy(selection: &Selection, dataset: &BoundaryDataset) -> Result<(), MapError> {
    for level in AdminLevel::ALL.into_iter().skip(1) {
        let name = selection.field(level);
        if name.is_empty() {
            continue;
        }
        let consistent = dataset.find(level, name).any(|unit| {
            AdminLevel::ALL[..level.index()].iter().all(|&parent| {
                let expected = selection.field(parent);
                expected.is_empty() || unit.parent_name(parent) == Some(expected)
            })
        });
        if !consistent {
            return Err(MapError::HierarchyMismatch {
                level,
                name: name.to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::ReferenceLayers;
    use geo::polygon;

    fn unit(level: AdminLevel, name: &str, parents: &[&str], x0: f64) -> AdministrativeUnit {
        AdministrativeUnit {
            level,
            name: name.to_string(),
            parents: parents.iter().map(|p| (*p).to_string()).collect(),
            geometry: MultiPolygon::new(vec![polygon![
                (x: x0, y: 10.0), (x: x0 + 1.0, y: 10.0), (x: x0 + 1.0, y: 11.0), (x: x0, y: 11.0),
            ]]),
        }
    }

    fn dataset() -> BoundaryDataset {
        BoundaryDataset::new(
            vec![
                unit(AdminLevel::Country, "Niger", &[], 0.0),
                unit(AdminLevel::Region, "Tahoua", &["Niger"], 1.0),
                unit(AdminLevel::Region, "Tillabéri", &["Niger"], 2.0),
                unit(AdminLevel::Department, "Konni", &["Niger", "Tahoua"], 3.0),
                unit(AdminLevel::Municipality, "Malbaza", &["Niger", "Tahoua", "Konni"], 4.0),
                unit(AdminLevel::Municipality, "Malbaza", &["Niger", "Tahoua", "Konni"], 5.0),
            ],
            ReferenceLayers::default(),
        )
    }

    #[test]
    fn single_field_resolves_to_its_level() {
        let data = dataset();
        let cases = [
            (AdminLevel::Country, "Niger"),
            (AdminLevel::Region, "Tahoua"),
            (AdminLevel::Department, "Konni"),
            (AdminLevel::Municipality, "Malbaza"),
        ];
        for (level, name) in cases {
            let mut selection = Selection::default();
            match level {
                AdminLevel::Country => selection.country = name.to_string(),
                AdminLevel::Region => selection.region = name.to_string(),
                AdminLevel::Department => selection.department = name.to_string(),
                AdminLevel::Municipality => selection.municipality = name.to_string(),
            }
            let resolved = resolve(&selection, &data).unwrap();
            assert_eq!(resolved.level, level);
            assert_eq!(resolved.label, name);
            assert!(resolved.geometries().count() > 0);
        }
    }

    #[test]
    fn all_matching_parts_are_kept() {
        let data = dataset();
        let selection = Selection {
            municipality: "Malbaza".to_string(),
            ..Selection::default()
        };
        assert_eq!(resolve(&selection, &data).unwrap().units.len(), 2);
    }

    #[test]
    fn empty_selection() {
        assert!(matches!(
            resolve(&Selection::default(), &dataset()),
            Err(MapError::NoSelection)
        ));
    }

    #[test]
    fn deepest_field_without_match() {
        let selection = Selection {
            country: "Niger".to_string(),
            region: "Nonexistent".to_string(),
            ..Selection::default()
        };
        match resolve(&selection, &dataset()) {
            Err(MapError::NoGeometry { level, name }) => {
                assert_eq!(level, AdminLevel::Region);
                assert_eq!(name, "Nonexistent");
            }
            other => panic!("expected NoGeometry, got {other:?}"),
        }
    }

    #[test]
    fn shallower_fields_are_ignored() {
        // департамент не из этого региона — выбор всё равно проходит
        let selection = Selection {
            country: "Atlantis".to_string(),
            region: "Tillabéri".to_string(),
            department: "Konni".to_string(),
            municipality: String::new(),
        };
        let data = dataset();
        let resolved = resolve(&selection, &data).unwrap();
        assert_eq!(resolved.level, AdminLevel::Department);
        assert_eq!(resolved.label, "Konni");
    }

    #[test]
    fn names_are_matched_exactly() {
        let data = dataset();
        for name in ["niger", "Niger ", "Nig"] {
            assert!(matches!(
                resolve(&Selection::country(name), &data),
                Err(MapError::NoGeometry { .. })
            ));
        }
    }

    #[test]
    fn hierarchy_validation_is_opt_in() {
        let data = dataset();
        let inconsistent = Selection {
            country: "Niger".to_string(),
            region: "Tillabéri".to_string(),
            department: "Konni".to_string(),
            municipality: String::new(),
        };
        assert!(resolve(&inconsistent, &data).is_ok());
        assert!(matches!(
            validate_hierarchy(&inconsistent, &data),
            Err(MapError::HierarchyMismatch { level: AdminLevel::Department, .. })
        ));

        let consistent = Selection {
            country: "Niger".to_string(),
            region: "Tahoua".to_string(),
            department: "Konni".to_string(),
            municipality: "Malbaza".to_string(),
        };
        assert!(validate_hierarchy(&consistent, &data).is_ok());
        // пропущенный промежуточный уровень не мешает
        let gap = Selection {
            region: String::new(),
            ..consistent
        };
        assert!(validate_hierarchy(&gap, &data).is_ok());
    }

    #[test]
    fn request_ids_are_stable_and_distinct() {
        let a = MapRequest::new(Selection::country("Niger"));
        let mut b = a.clone();
        let id = a.request_id().unwrap();
        assert_eq!(id, b.request_id().unwrap());
        assert_eq!(id.len(), 16);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        b.inset = InsetPosition::BottomRight;
        assert_ne!(id, b.request_id().unwrap());
        b.inset = InsetPosition::UpperRight;
        b.zoom_radius = Some(0.5);
        assert_ne!(id, b.request_id().unwrap());
    }

    #[test]
    fn inset_positions_parse() {
        assert_eq!("upper right".parse::<InsetPosition>(), Ok(InsetPosition::UpperRight));
        assert_eq!("bottom-right".parse::<InsetPosition>(), Ok(InsetPosition::BottomRight));
        assert!("center".parse::<InsetPosition>().is_err());
        for position in InsetPosition::ALL {
            assert_eq!(position.to_string().parse::<InsetPosition>(), Ok(position));
        }
    }

    #[test]
    fn request_defaults_from_json() {
        let request: MapRequest =
            serde_json::from_str(r#"{"selection": {"country": "Niger"}, "inset": "bottom right"}"#)
                .unwrap();
        assert_eq!(request.title, "Fig. 1 Study Area Map");
        assert_eq!(request.basemap, BasemapSource::Osm);
        assert_eq!(request.inset, InsetPosition::BottomRight);
        assert_eq!(request.zoom_radius, None);
    }
}
