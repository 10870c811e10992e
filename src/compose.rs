// src/compose.rs
//! Компоновка карты: основной вид и врезка на одной фигуре
//!
//! ## Этапы
//!
//! 1. **Раскладка** (`plan_layout`): фигура `width_in × height_in` при `dpi`,
//!    основная рамка вписана с равным масштабом осей в долевой прямоугольник
//!    `[0.125, 0.11, 0.775, 0.77]`, врезка вписана в долевой прямоугольник
//!    `InsetPosition` внутри основной рамки.
//! 2. **Основной вид**: подложка выбранного источника, границы, береговая
//!    линия, контур территории, сетка, подписи, линейка, стрелка севера.
//! 3. **Фигура**: вид в рамке, подписи сетки, заголовок.
//! 4. **Врезка**: континент страны на стандартной подложке, контур страны.
//! 5. **Обрезка** по содержимому с полем 0.1 дюйма.
//!
//! Каждый вид рисуется в собственный буфер, поэтому линии за пределами
//! рамки обрезаются без отдельного отсечения.

use geo::{BoundingRect, InteriorPoint, LineString};
use image::{RgbaImage, imageops};
use rusttype::Font;
use tracing::{debug, info};

use crate::basemap::{Basemap, HttpClient};
use crate::boundary::{AdminLevel, BoundaryDataset, outline_rings};
use crate::config::{FigureSettings, MapConfig, parse_hex_color};
use crate::error::MapError;
use crate::extent::Extent;
use crate::render::draw::{draw_dotted_polyline, draw_polyline, stroke_rect};
use crate::render::overlay::{Graticule, ScaleBar, draw_boxed_label, draw_north_arrow};
use crate::render::text::{HAlign, TextPainter, VAlign};
use crate::render::{BLACK, Frame, PixelRect, WHITE, crop_to_content, render_basemap};
use crate::selection::{InsetPosition, MapRequest, Resolved};

/// Долевой прямоугольник осей на фигуре `[left, bottom, width, height]`
pub const AXES_FRACTION: [f64; 4] = [0.125, 0.11, 0.775, 0.77];

/// Поле вокруг содержимого при обрезке (дюймы)
pub const CROP_PAD_IN: f64 = 0.1;

/// Толщина рамки вида (пт)
const FRAME_WIDTH_PT: f32 = 0.8;
/// Толщина государственных границ (пт)
const BORDER_WIDTH_PT: f32 = 1.0;
/// Шаг точек пунктира в толщинах линии
const DOT_SPACING: f32 = 2.65;
/// Толщина линий сетки (пт)
const GRID_WIDTH_PT: f32 = 0.5;
/// Отступ подписей от рамки (пт)
const LABEL_GAP_PT: f32 = 3.5;
/// Отступ заголовка от рамки (пт)
const TITLE_GAP_PT: f32 = 6.0;

/// Раскладка готовой фигуры
#[derive(Debug, Clone, PartialEq)]
pub struct Layout {
    /// Размер фигуры до обрезки
    pub figure_size: (u32, u32),
    /// Рамка основного вида в пикселях фигуры (до обрезки)
    pub main_rect: PixelRect,
    /// Рамка врезки в пикселях фигуры (до обрезки)
    pub inset_rect: PixelRect,
    pub main_extent: Extent,
    pub inset_extent: Extent,
    pub inset_continent: String,
    pub main_zoom: u8,
    pub inset_zoom: u8,
    /// Прямоугольник обрезки `(x, y, w, h)`
    pub crop: [u32; 4],
}

/// Скомпонованная фигура
#[derive(Debug, Clone)]
pub struct Composition {
    pub image: RgbaImage,
    pub layout: Layout,
}

/// Рамки основного вида и врезки в пикселях фигуры
///
/// Обе рамки вписаны по центру своих долевых прямоугольников с равным
/// масштабом осей и выровнены по целым пикселям.
#[must_use]
pub fn plan_layout(
    figure: &FigureSettings,
    main_extent: &Extent,
    inset: InsetPosition,
    inset_extent: &Extent,
) -> (PixelRect, PixelRect) {
    let (width, height) = figure.pixel_size();
    let page = PixelRect::new(0.0, 0.0, f64::from(width), f64::from(height));
    let main_rect = PixelRect::from_fraction(&page, AXES_FRACTION)
        .fit_aspect(main_extent.width() / main_extent.height())
        .snapped();
    let inset_rect = PixelRect::from_fraction(&main_rect, inset.rect())
        .fit_aspect(inset_extent.width() / inset_extent.height())
        .snapped();
    (main_rect, inset_rect)
}

/// Собирает фигуру для одного запроса
///
/// Разделяет с другими запросами только неизменяемое состояние.
pub struct MapComposer<'a, C> {
    config: &'a MapConfig,
    dataset: &'a BoundaryDataset,
    client: &'a C,
    font: &'a Font<'static>,
}

impl<'a, C: HttpClient> MapComposer<'a, C> {
    #[must_use]
    pub fn new(
        config: &'a MapConfig,
        dataset: &'a BoundaryDataset,
        client: &'a C,
        font: &'a Font<'static>,
    ) -> Self {
        Self {
            config,
            dataset,
            client,
            font,
        }
    }

    /// Строит основной вид и врезку
    ///
    /// # Ошибки
    /// `MapError::Render` — подложка не загрузилась, неверный цвет контура
    /// или для континента страны не задан экстент.
    pub fn compose(
        &self,
        request: &MapRequest,
        resolved: &Resolved<'_>,
        extent: &Extent,
    ) -> Result<Composition, MapError> {
        let figure = &self.config.figure;
        let style = &self.config.style;
        let px_per_pt = figure.px_per_pt();
        let painter = TextPainter::new(self.font, px_per_pt);
        let outline_color = parse_hex_color(&style.outline_color)?;

        let country = request.selection.field(AdminLevel::Country);
        let (continent, inset_extent) = self.config.inset.continent_extent(country).ok_or_else(|| {
            MapError::Render(format!(
                "No inset extent configured for the continent of '{country}'"
            ))
        })?;

        let (main_rect, inset_rect) = plan_layout(figure, extent, request.inset, &inset_extent);
        let figure_size = figure.pixel_size();
        debug!(?main_rect, ?inset_rect, continent, "Раскладка фигуры");

        let basemap = Basemap::new(request.basemap, &self.config.basemap, self.client);
        let main_zoom = self.config.basemap.main_zoom;
        let inset_zoom = self.config.basemap.inset_zoom;

        // ─── Основной вид ───
        let (w, h) = main_rect.size();
        let frame = Frame::new(*extent, w, h);
        info!(source = %basemap.source(), zoom = main_zoom, "Основной вид");
        let layer = basemap.main_tile_layer(extent, main_zoom)?;
        let mut view = render_basemap(&frame, &layer);

        self.draw_reference(&mut view, &frame, px_per_pt);
        for geometry in resolved.geometries() {
            for ring in outline_rings(geometry) {
                let points = frame.project_line(&ring);
                draw_polyline(&mut view, &points, style.outline_width * px_per_pt, outline_color);
            }
        }

        let graticule = Graticule::for_frame(&frame);
        graticule.draw_lines(&mut view, &frame, GRID_WIDTH_PT * px_per_pt);

        for geometry in resolved.geometries() {
            for polygon in geometry {
                if let Some(point) = polygon.interior_point() {
                    let anchor = frame.project(point.x(), point.y());
                    draw_boxed_label(
                        &mut view,
                        &painter,
                        &resolved.label,
                        style.label_size,
                        anchor,
                        px_per_pt,
                    );
                }
            }
        }

        if let Some(bar) = ScaleBar::for_frame(&frame) {
            debug!(meters = bar.meters, "Масштабная линейка");
            bar.draw(&mut view, &painter, px_per_pt);
        }
        draw_north_arrow(&mut view, &painter, px_per_pt, style.north_size);

        // ─── Фигура ───
        let mut canvas = RgbaImage::from_pixel(figure_size.0, figure_size.1, WHITE);
        place_view(&mut canvas, &view, &main_rect, px_per_pt);
        graticule.draw_labels(
            &mut canvas,
            &painter,
            &main_rect,
            &frame,
            LABEL_GAP_PT * px_per_pt,
        );
        painter.draw(
            &mut canvas,
            &request.title,
            style.title_size,
            (
                (main_rect.x + main_rect.width / 2.0) as f32,
                main_rect.y as f32 - TITLE_GAP_PT * px_per_pt,
            ),
            (HAlign::Center, VAlign::Bottom),
            BLACK,
        );

        // ─── Врезка ───
        let (w, h) = inset_rect.size();
        let inset_frame = Frame::new(inset_extent, w, h);
        info!(continent, zoom = inset_zoom, "Врезка");
        let inset_layer = basemap.inset_tile_layer(&inset_extent, inset_zoom)?;
        let mut inset_view = render_basemap(&inset_frame, &inset_layer);
        self.draw_reference(&mut inset_view, &inset_frame, px_per_pt);
        for unit in self.dataset.find(AdminLevel::Country, country) {
            for ring in outline_rings(&unit.geometry) {
                let points = inset_frame.project_line(&ring);
                draw_polyline(
                    &mut inset_view,
                    &points,
                    style.outline_width * px_per_pt,
                    outline_color,
                );
            }
        }
        place_view(&mut canvas, &inset_view, &inset_rect, px_per_pt);

        // ─── Обрезка ───
        let pad = (CROP_PAD_IN * f64::from(figure.dpi)).round() as u32;
        let (image, crop) = crop_to_content(&canvas, WHITE, pad);
        debug!(?crop, "Обрезка по содержимому");

        Ok(Composition {
            image,
            layout: Layout {
                figure_size,
                main_rect,
                inset_rect,
                main_extent: *extent,
                inset_extent,
                inset_continent: continent.to_string(),
                main_zoom,
                inset_zoom,
                crop,
            },
        })
    }

    /// Государственные границы (пунктир) и береговая линия
    fn draw_reference(&self, view: &mut RgbaImage, frame: &Frame, px_per_pt: f32) {
        let reference = self.dataset.reference();
        let border_width = BORDER_WIDTH_PT * px_per_pt;
        for line in visible(&reference.borders, &frame.extent) {
            let points = frame.project_line(line);
            draw_dotted_polyline(view, &points, border_width, DOT_SPACING * border_width, BLACK);
        }
        let coast_width = self.config.style.coastline_width * px_per_pt;
        for line in visible(&reference.coastlines, &frame.extent) {
            let points = frame.project_line(line);
            draw_polyline(view, &points, coast_width, BLACK);
        }
    }
}

/// Линии, чья рамка пересекает экстент
fn visible<'l>(lines: &'l [LineString<f64>], extent: &Extent) -> impl Iterator<Item = &'l LineString<f64>> {
    let extent = *extent;
    lines.iter().filter(move |line| {
        line.bounding_rect().is_some_and(|rect| {
            rect.min().x <= extent.max_lon
                && rect.max().x >= extent.min_lon
                && rect.min().y <= extent.max_lat
                && rect.max().y >= extent.min_lat
        })
    })
}

/// Переносит вид на фигуру и обводит рамкой снаружи
fn place_view(canvas: &mut RgbaImage, view: &RgbaImage, rect: &PixelRect, px_per_pt: f32) {
    imageops::replace(canvas, view, rect.x as i64, rect.y as i64);
    let t = (FRAME_WIDTH_PT * px_per_pt).max(1.0).round();
    stroke_rect(
        canvas,
        rect.x as f32 - t,
        rect.y as f32 - t,
        rect.width as f32 + 2.0 * t,
        rect.height as f32 + 2.0 * t,
        t,
        BLACK,
    );
}
