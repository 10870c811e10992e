// src/render/overlay.rs
//! Картографические элементы поверх подложки
//!
//! - Градусная сетка с «круглым» шагом и подписями `5°E`, `12°N`
//! - Масштабная линейка (длины 1-2-5, м/км)
//! - Стрелка севера
//! - Подпись территории в полупрозрачной рамке

use geo::{HaversineDistance, Point};
use image::{Rgba, RgbaImage};

use super::draw::{draw_arrow, fill_rect_blended, stroke_rect};
use super::text::{HAlign, TextPainter, VAlign};
use super::{BLACK, Frame, PixelRect};

/// Допустимые шаги сетки в градусах, по возрастанию
const NICE_STEPS: &[f64] = &[
    0.01, 0.02, 0.05, 0.1, 0.2, 0.25, 0.5, 1.0, 2.0, 2.5, 5.0, 10.0, 15.0, 20.0, 30.0, 45.0,
    60.0, 90.0,
];

/// Не больше стольких линий сетки на ось
pub const MAX_GRID_LINES: usize = 6;

/// Серый с альфой 0.5
pub const GRID_COLOR: Rgba<u8> = Rgba([128, 128, 128, 128]);

/// Кегль подписей сетки (пт)
pub const GRID_LABEL_PT: f32 = 8.0;

/// Доля ширины вида, которую занимает масштабная линейка
const SCALE_BAR_FRACTION: f64 = 0.2;

/// Линии сетки одной оси
#[derive(Debug, Clone, PartialEq)]
pub struct GridTicks {
    pub step: f64,
    pub values: Vec<f64>,
}

impl GridTicks {
    /// Подбирает наименьший «круглый» шаг, дающий не больше `MAX_GRID_LINES` линий
    #[must_use]
    pub fn for_range(min: f64, max: f64) -> Self {
        for &step in NICE_STEPS {
            let values = ticks_in(min, max, step);
            if values.len() <= MAX_GRID_LINES {
                return Self { step, values };
            }
        }
        let step = NICE_STEPS[NICE_STEPS.len() - 1];
        Self {
            step,
            values: ticks_in(min, max, step),
        }
    }

    /// Знаков после запятой, достаточных для подписи шага
    fn decimals(&self) -> usize {
        (0..3)
            .find(|&d| {
                let scaled = self.step * 10f64.powi(d as i32);
                (scaled - scaled.round()).abs() < 1e-9
            })
            .unwrap_or(3)
    }
}

/// Кратные `step` значения внутри `[min, max]`
fn ticks_in(min: f64, max: f64, step: f64) -> Vec<f64> {
    let first = (min / step - 1e-9).ceil() as i64;
    let last = (max / step + 1e-9).floor() as i64;
    (first..=last)
        .map(|k| {
            let v = k as f64 * step;
            if v == 0.0 { 0.0 } else { v }
        })
        .collect()
}

fn format_degrees(value: f64, decimals: usize, positive: char, negative: char) -> String {
    let abs = value.abs();
    if abs < 0.5 * 10f64.powi(-(decimals as i32)) {
        return "0°".to_string();
    }
    let hemisphere = if value > 0.0 { positive } else { negative };
    format!("{abs:.decimals$}°{hemisphere}")
}

/// Подпись долготы: `5°E`, `12.5°W`, `0°`
#[must_use]
pub fn format_lon(value: f64, decimals: usize) -> String {
    format_degrees(value, decimals, 'E', 'W')
}

/// Подпись широты: `12°N`, `3°S`, `0°`
#[must_use]
pub fn format_lat(value: f64, decimals: usize) -> String {
    format_degrees(value, decimals, 'N', 'S')
}

/// Градусная сетка вида
#[derive(Debug, Clone, PartialEq)]
pub struct Graticule {
    pub lon: GridTicks,
    pub lat: GridTicks,
}

impl Graticule {
    #[must_use]
    pub fn for_frame(frame: &Frame) -> Self {
        Self {
            lon: GridTicks::for_range(frame.extent.min_lon, frame.extent.max_lon),
            lat: GridTicks::for_range(frame.extent.min_lat, frame.extent.max_lat),
        }
    }

    /// Линии сетки в буфере вида
    pub fn draw_lines(&self, image: &mut RgbaImage, frame: &Frame, width: f32) {
        let (w, h) = (image.width() as f32, image.height() as f32);
        let half = width.max(1.0) / 2.0;
        for &lon in &self.lon.values {
            let (x, _) = frame.project(lon, frame.extent.max_lat);
            fill_rect_blended(image, x - half, 0.0, x + half, h, GRID_COLOR);
        }
        for &lat in &self.lat.values {
            let (_, y) = frame.project(frame.extent.min_lon, lat);
            fill_rect_blended(image, 0.0, y - half, w, y + half, GRID_COLOR);
        }
    }

    /// Подписи сетки на фигуре: долготы под рамкой, широты слева от неё
    pub fn draw_labels(
        &self,
        figure: &mut RgbaImage,
        painter: &TextPainter<'_>,
        rect: &PixelRect,
        frame: &Frame,
        gap: f32,
    ) {
        let lon_decimals = self.lon.decimals();
        for &lon in &self.lon.values {
            let (x, _) = frame.project(lon, frame.extent.max_lat);
            let anchor = (rect.x as f32 + x, rect.bottom() as f32 + gap);
            painter.draw(
                figure,
                &format_lon(lon, lon_decimals),
                GRID_LABEL_PT,
                anchor,
                (HAlign::Center, VAlign::Top),
                BLACK,
            );
        }
        let lat_decimals = self.lat.decimals();
        for &lat in &self.lat.values {
            let (_, y) = frame.project(frame.extent.min_lon, lat);
            let anchor = (rect.x as f32 - gap, rect.y as f32 + y);
            painter.draw(
                figure,
                &format_lat(lat, lat_decimals),
                GRID_LABEL_PT,
                anchor,
                (HAlign::Right, VAlign::Center),
                BLACK,
            );
        }
    }
}

/// Масштабная линейка
#[derive(Debug, Clone, PartialEq)]
pub struct ScaleBar {
    /// Длина линейки на местности (м)
    pub meters: f64,
    /// Длина линейки в пикселях вида
    pub length_px: f32,
    pub label: String,
}

/// Наибольшее число вида 1, 2, 5 × 10ⁿ, не превосходящее `value`
fn nice_length(value: f64) -> f64 {
    let magnitude = 10f64.powf(value.log10().floor());
    [5.0, 2.0, 1.0]
        .into_iter()
        .map(|m| m * magnitude)
        .find(|&v| v <= value)
        .unwrap_or(magnitude)
}

fn format_distance(meters: f64) -> String {
    if meters >= 1000.0 {
        format!("{} km", meters / 1000.0)
    } else {
        format!("{meters} m")
    }
}

impl ScaleBar {
    /// Линейка для вида: расстояние по параллели через центр экстента
    ///
    /// `None`, если экстент вырожден по долготе (например, у полюса).
    #[must_use]
    pub fn for_frame(frame: &Frame) -> Option<Self> {
        let (_, lat) = frame.extent.center();
        let west = Point::new(frame.extent.min_lon, lat);
        let east = Point::new(frame.extent.max_lon, lat);
        let meters_per_px = west.haversine_distance(&east) / f64::from(frame.width);
        if !meters_per_px.is_finite() || meters_per_px <= 0.0 {
            return None;
        }

        let target = meters_per_px * f64::from(frame.width) * SCALE_BAR_FRACTION;
        let meters = nice_length(target);
        Some(Self {
            meters,
            length_px: (meters / meters_per_px) as f32,
            label: format_distance(meters),
        })
    }

    /// Рисует линейку в левом нижнем углу вида на белой подложке
    pub fn draw(&self, image: &mut RgbaImage, painter: &TextPainter<'_>, px_per_pt: f32) {
        let margin = 6.0 * px_per_pt;
        let pad = 3.0 * px_per_pt;
        let bar_height = (2.0 * px_per_pt).max(2.0);
        let label_size = GRID_LABEL_PT;

        let label = painter.place(&self.label, label_size, (0.0, 0.0), HAlign::Center, VAlign::Top);
        let (label_w, label_h) = label.map_or((0.0, 0.0), |b| (b.width, b.height + pad));

        let box_w = self.length_px.max(label_w) + 2.0 * pad;
        let box_h = bar_height + label_h + 2.0 * pad;
        let box_x = margin;
        let box_y = image.height() as f32 - margin - box_h;
        fill_rect_blended(
            image,
            box_x,
            box_y,
            box_x + box_w,
            box_y + box_h,
            Rgba([255, 255, 255, 204]),
        );

        let bar_x = box_x + (box_w - self.length_px) / 2.0;
        let bar_y = box_y + pad;
        fill_rect_blended(image, bar_x, bar_y, bar_x + self.length_px, bar_y + bar_height, BLACK);

        painter.draw(
            image,
            &self.label,
            label_size,
            (box_x + box_w / 2.0, bar_y + bar_height + pad),
            (HAlign::Center, VAlign::Top),
            BLACK,
        );
    }
}

/// Стрелка севера: остриё в долях вида (0.1, 0.9), буква «N» под ней в (0.1, 0.8)
pub fn draw_north_arrow(
    image: &mut RgbaImage,
    painter: &TextPainter<'_>,
    px_per_pt: f32,
    size_pt: f32,
) {
    let (w, h) = (image.width() as f32, image.height() as f32);
    let tip = (0.1 * w, 0.1 * h);
    let text_at = (0.1 * w, 0.2 * h);

    let tail_y = painter
        .draw(
            image,
            "N",
            size_pt,
            text_at,
            (HAlign::Center, VAlign::Center),
            BLACK,
        )
        .map_or(text_at.1, |b| b.y - 2.0);

    draw_arrow(
        image,
        (tip.0, tail_y),
        tip,
        5.0 * px_per_pt,
        15.0 * px_per_pt,
        12.0 * px_per_pt,
        BLACK,
    );
}

/// Подпись по центру над точкой в белой рамке (альфа 0.6) с тонким чёрным краем
pub fn draw_boxed_label(
    image: &mut RgbaImage,
    painter: &TextPainter<'_>,
    text: &str,
    size_pt: f32,
    anchor: (f32, f32),
    px_per_pt: f32,
) {
    let Some(placed) = painter.place(text, size_pt, anchor, HAlign::Center, VAlign::Bottom) else {
        return;
    };
    let pad = 0.3 * size_pt * px_per_pt;
    let (x, y) = (placed.x - pad, placed.y - pad);
    let (w, h) = (placed.width + 2.0 * pad, placed.height + 2.0 * pad);
    fill_rect_blended(image, x, y, x + w, y + h, Rgba([255, 255, 255, 153]));
    stroke_rect(image, x, y, w, h, px_per_pt.max(1.0), BLACK);
    painter.draw_placed(image, text, &placed, BLACK);
}
