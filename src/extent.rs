// src/extent.rs
//! Экстент карты — прямоугольник в градусах долготы/широты
//!
//! Экстент основной карты = охватывающий прямоугольник выбранной геометрии,
//! расширенный на поле `margin` со всех сторон, чтобы контур не обрезался
//! краем изображения.
//!
//! Пересечение антимеридиана (±180°) не обрабатывается.

use geo::{BoundingRect, MultiPolygon};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Поле вокруг геометрии по умолчанию (градусы)
pub const DEFAULT_MARGIN_DEG: f64 = 0.1;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExtentError {
    #[error("Cannot compute extent of an empty geometry set")]
    EmptyGeometry,

    #[error("Invalid extent margin {0}: must be finite and non-negative")]
    InvalidMargin(f64),

    #[error("Degenerate extent {0:?}: zero width or height")]
    Degenerate(Extent),
}

/// Географический прямоугольник (градусы)
///
/// В TOML записывается массивом `[min_lon, max_lon, min_lat, max_lat]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct Extent {
    pub min_lon: f64,
    pub max_lon: f64,
    pub min_lat: f64,
    pub max_lat: f64,
}

impl Extent {
    #[must_use]
    pub fn new(min_lon: f64, max_lon: f64, min_lat: f64, max_lat: f64) -> Self {
        Self {
            min_lon,
            max_lon,
            min_lat,
            max_lat,
        }
    }

    #[must_use]
    pub fn width(&self) -> f64 {
        self.max_lon - self.min_lon
    }

    #[must_use]
    pub fn height(&self) -> f64 {
        self.max_lat - self.min_lat
    }

    #[must_use]
    pub fn center(&self) -> (f64, f64) {
        (
            (self.min_lon + self.max_lon) / 2.0,
            (self.min_lat + self.max_lat) / 2.0,
        )
    }

    /// Расширяет экстент на `margin` градусов с каждой стороны
    #[must_use]
    pub fn padded(&self, margin: f64) -> Self {
        Self {
            min_lon: self.min_lon - margin,
            max_lon: self.max_lon + margin,
            min_lat: self.min_lat - margin,
            max_lat: self.max_lat + margin,
        }
    }
}

impl From<[f64; 4]> for Extent {
    fn from([min_lon, max_lon, min_lat, max_lat]: [f64; 4]) -> Self {
        Self::new(min_lon, max_lon, min_lat, max_lat)
    }
}

impl From<Extent> for [f64; 4] {
    fn from(e: Extent) -> Self {
        [e.min_lon, e.max_lon, e.min_lat, e.max_lat]
    }
}

/// Вычисляет экстент набора геометрий с полем `margin`
///
/// # Ошибки
/// - `EmptyGeometry` — в наборе нет ни одной вершины
/// - `InvalidMargin` — поле отрицательное или не конечное
/// - `Degenerate` — итоговый прямоугольник имеет нулевую ширину или высоту
///
/// # Пример
/// ```rust
/// use geo::{MultiPolygon, polygon};
/// use studymap::extent::compute_extent;
///
/// let square = MultiPolygon::new(vec![polygon![
///     (x: 0.0, y: 0.0), (x: 2.0, y: 0.0), (x: 2.0, y: 1.0), (x: 0.0, y: 1.0),
/// ]]);
/// let extent = compute_extent([&square], 0.1).unwrap();
/// assert!((extent.min_lon + 0.1).abs() < 1e-12);
/// assert!((extent.max_lat - 1.1).abs() < 1e-12);
/// ```
pub fn compute_extent<'a, I>(geometries: I, margin: f64) -> Result<Extent, ExtentError>
where
    I: IntoIterator<Item = &'a MultiPolygon<f64>>,
{
    if !margin.is_finite() || margin < 0.0 {
        return Err(ExtentError::InvalidMargin(margin));
    }

    let raw = geometries
        .into_iter()
        .filter_map(|g| g.bounding_rect())
        .map(|rect| Extent::new(rect.min().x, rect.max().x, rect.min().y, rect.max().y))
        .reduce(|a, b| {
            Extent::new(
                a.min_lon.min(b.min_lon),
                a.max_lon.max(b.max_lon),
                a.min_lat.min(b.min_lat),
                a.max_lat.max(b.max_lat),
            )
        })
        .ok_or(ExtentError::EmptyGeometry)?;

    let extent = raw.padded(margin);
    if extent.width() <= 0.0 || extent.height() <= 0.0 {
        return Err(ExtentError::Degenerate(extent));
    }
    Ok(extent)
}
