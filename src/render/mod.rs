//! Растровая отрисовка карты
//!
//! Вид (основная карта или врезка) рисуется в собственный буфер размером
//! со свою рамку и затем накладывается на фигуру. Поэтому всё, что выходит
//! за рамку вида, обрезается само собой.
//!
//! ## Проекция
//!
//! Равнопромежуточная (широта/долгота без преобразования): x линейно
//! зависит от долготы, y от широты, масштаб по осям одинаковый.

pub mod draw;
pub mod overlay;
pub mod text;

use geo::LineString;
use image::{Rgba, RgbaImage};

use crate::basemap::TileLayer;
use crate::extent::Extent;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

pub const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
pub const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// Прямоугольник в пикселях фигуры (y растёт вниз)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl PixelRect {
    #[must_use]
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Прямоугольник по долям `[left, bottom, width, height]` (ось y направлена вверх)
    #[must_use]
    pub fn from_fraction(outer: &PixelRect, [left, bottom, width, height]: [f64; 4]) -> Self {
        Self {
            x: outer.x + left * outer.width,
            y: outer.y + (1.0 - bottom - height) * outer.height,
            width: width * outer.width,
            height: height * outer.height,
        }
    }

    /// Наибольший прямоугольник с отношением сторон `aspect` (ширина/высота),
    /// вписанный по центру
    #[must_use]
    pub fn fit_aspect(&self, aspect: f64) -> Self {
        let (width, height) = if self.width / self.height > aspect {
            (self.height * aspect, self.height)
        } else {
            (self.width, self.width / aspect)
        };
        Self {
            x: self.x + (self.width - width) / 2.0,
            y: self.y + (self.height - height) / 2.0,
            width,
            height,
        }
    }

    /// Выравнивание по целым пикселям (размер не меньше 1)
    #[must_use]
    pub fn snapped(&self) -> Self {
        Self {
            x: self.x.round(),
            y: self.y.round(),
            width: self.width.round().max(1.0),
            height: self.height.round().max(1.0),
        }
    }

    #[must_use]
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    #[must_use]
    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    #[must_use]
    pub fn size(&self) -> (u32, u32) {
        (self.width as u32, self.height as u32)
    }
}

/// Вид карты: экстент, отображённый на буфер `width × height`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    pub extent: Extent,
    pub width: u32,
    pub height: u32,
}

impl Frame {
    #[must_use]
    pub fn new(extent: Extent, width: u32, height: u32) -> Self {
        Self {
            extent,
            width,
            height,
        }
    }

    /// Географическая точка → пиксель буфера вида
    #[must_use]
    pub fn project(&self, lon: f64, lat: f64) -> (f32, f32) {
        let x = (lon - self.extent.min_lon) / self.extent.width() * f64::from(self.width);
        let y = (self.extent.max_lat - lat) / self.extent.height() * f64::from(self.height);
        (x as f32, y as f32)
    }

    /// Долгота центра столбца пикселей
    #[must_use]
    pub fn column_lon(&self, col: u32) -> f64 {
        self.extent.min_lon + (f64::from(col) + 0.5) / f64::from(self.width) * self.extent.width()
    }

    /// Широта центра строки пикселей
    #[must_use]
    pub fn row_lat(&self, row: u32) -> f64 {
        self.extent.max_lat - (f64::from(row) + 0.5) / f64::from(self.height) * self.extent.height()
    }

    /// Проецирует линию, отбрасывая вершины ближе полупикселя к предыдущей
    #[must_use]
    pub fn project_line(&self, line: &LineString<f64>) -> Vec<(f32, f32)> {
        let mut points: Vec<(f32, f32)> = Vec::with_capacity(line.0.len());
        for coord in &line.0 {
            let p = self.project(coord.x, coord.y);
            match points.last() {
                Some(&(x, y)) if (p.0 - x).abs() < 0.5 && (p.1 - y).abs() < 0.5 => {}
                _ => points.push(p),
            }
        }
        // замыкающую вершину сохраняем, даже если она совпала с предыдущей
        if let (Some(last), Some(&(x, y))) = (line.0.last(), points.last()) {
            let p = self.project(last.x, last.y);
            if p != (x, y) && line.0.len() > 1 {
                points.push(p);
            }
        }
        points
    }
}

/// Пересэмплирует мозаику тайлов в буфер вида
///
/// Веб-меркатор разделим по осям: столбец мозаики зависит только от
/// долготы, строка только от широты, поэтому индексы считаются один раз
/// на столбец и на строку.
#[must_use]
pub fn render_basemap(frame: &Frame, layer: &TileLayer) -> RgbaImage {
    let columns: Vec<u32> = (0..frame.width)
        .map(|col| layer.column_for(frame.column_lon(col)))
        .collect();
    let rows: Vec<u32> = (0..frame.height)
        .map(|row| layer.row_for(frame.row_lat(row)))
        .collect();

    let mut image = RgbaImage::new(frame.width, frame.height);
    let stride = frame.width as usize * 4;
    let fill_row = |(row, chunk): (usize, &mut [u8])| {
        let src_row = rows[row];
        for (col, px) in chunk.chunks_exact_mut(4).enumerate() {
            px.copy_from_slice(&layer.image.get_pixel(columns[col], src_row).0);
        }
    };

    #[cfg(feature = "parallel")]
    image.par_chunks_mut(stride).enumerate().for_each(fill_row);
    #[cfg(not(feature = "parallel"))]
    image.chunks_mut(stride).enumerate().for_each(fill_row);

    image
}

/// Обрезает фигуру по содержимому (всё, что отличается от фона) с полем `pad`
///
/// Возвращает обрезанное изображение и прямоугольник обрезки `(x, y, w, h)`.
#[must_use]
pub fn crop_to_content(image: &RgbaImage, background: Rgba<u8>, pad: u32) -> (RgbaImage, [u32; 4]) {
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (u32::MAX, u32::MAX, 0, 0);
    for (x, y, px) in image.enumerate_pixels() {
        if *px != background {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
    }
    if min_x > max_x {
        return (image.clone(), [0, 0, image.width(), image.height()]);
    }

    let x0 = min_x.saturating_sub(pad);
    let y0 = min_y.saturating_sub(pad);
    let x1 = (max_x + pad + 1).min(image.width());
    let y1 = (max_y + pad + 1).min(image.height());
    let rect = [x0, y0, x1 - x0, y1 - y0];
    (
        image::imageops::crop_imm(image, x0, y0, rect[2], rect[3]).to_image(),
        rect,
    )
}
