// src/coord.rs
//! Координаты тайлов Web Mercator (схема XYZ)
//!
//! - X: столбец (0..2^z − 1, с запада на восток)
//! - Y: строка (0..2^z − 1, с севера на юг)
//! - Z: уровень масштаба
//!
//! Тайл: квадрат 256×256 пикселей. Широты за пределами ±85.0511° не
//! представимы и прижимаются к границе.

use std::f64::consts::PI;

/// Размер тайла в пикселях
pub const TILE_SIZE: u32 = 256;

/// Предельная широта Web Mercator
pub const MAX_LAT: f64 = 85.051_128_78;
pub const MIN_LAT: f64 = -MAX_LAT;

/// Максимальный уровень масштаба
pub const MAX_ZOOM: u8 = 22;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileCoord {
    pub x: u32,
    pub y: u32,
    pub z: u8,
}

/// Число тайлов по одной оси на уровне `zoom`
#[inline]
#[must_use]
pub fn tiles_per_axis(zoom: u8) -> u32 {
    1u32 << zoom
}

/// Глобальные пиксельные координаты точки на уровне `zoom`
///
/// Долгота и широта прижимаются к допустимому диапазону, поэтому функция
/// определена для любых конечных входных значений.
#[inline]
#[must_use]
pub fn to_global_pixel(lon: f64, lat: f64, zoom: u8) -> (f64, f64) {
    let size = f64::from(tiles_per_axis(zoom)) * f64::from(TILE_SIZE);
    let lon = lon.clamp(-180.0, 180.0);
    let lat_rad = lat.clamp(MIN_LAT, MAX_LAT).to_radians();

    let x = (lon + 180.0) / 360.0 * size;
    let y = (1.0 - lat_rad.tan().asinh() / PI) / 2.0 * size;
    (x, y)
}

/// Тайл, содержащий точку
#[inline]
#[must_use]
pub fn to_tile_coords(lon: f64, lat: f64, zoom: u8) -> TileCoord {
    let (px, py) = to_global_pixel(lon, lat, zoom);
    let last = tiles_per_axis(zoom) - 1;
    TileCoord {
        x: ((px / f64::from(TILE_SIZE)) as u32).min(last),
        y: ((py / f64::from(TILE_SIZE)) as u32).min(last),
        z: zoom,
    }
}

/// Северо-западный угол тайла: `(lon, lat)`
#[inline]
#[must_use]
pub fn tile_to_lon_lat(tile: &TileCoord) -> (f64, f64) {
    let n = f64::from(tiles_per_axis(tile.z));
    let lon = f64::from(tile.x) / n * 360.0 - 180.0;
    let y = f64::from(tile.y) / n;
    let lat = (PI * (1.0 - 2.0 * y)).sinh().atan().to_degrees();
    (lon, lat)
}
