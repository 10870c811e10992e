// src/render/draw.rs
//! Примитивы рисования поверх `imageproc`
//!
//! Толстые линии строятся из четырёхугольников по сегментам и кругов в
//! вершинах. Полупрозрачные заливки смешиваются вручную через `Pixel::blend`.

use image::{Pixel, Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut, draw_polygon_mut};
use imageproc::point::Point;

/// Толщина, до которой линия рисуется одним проходом Брезенхэма
const THIN_LINE_PX: f32 = 1.5;

fn to_point((x, y): (f32, f32)) -> Point<i32> {
    Point::new(x.round() as i32, y.round() as i32)
}

/// Сегмент целиком вне изображения (с запасом на толщину)
fn segment_outside(image: &RgbaImage, a: (f32, f32), b: (f32, f32), pad: f32) -> bool {
    let (w, h) = (image.width() as f32, image.height() as f32);
    (a.0.max(b.0) < -pad)
        || (a.0.min(b.0) > w + pad)
        || (a.1.max(b.1) < -pad)
        || (a.1.min(b.1) > h + pad)
}

/// Заливает многоугольник, пропуская вырожденные (`imageproc` требует,
/// чтобы первая и последняя вершины различались)
pub fn fill_polygon(image: &mut RgbaImage, points: &[(f32, f32)], color: Rgba<u8>) {
    let mut poly: Vec<Point<i32>> = Vec::with_capacity(points.len());
    for &p in points {
        let p = to_point(p);
        if poly.last() != Some(&p) {
            poly.push(p);
        }
    }
    while poly.len() > 1 && poly.first() == poly.last() {
        poly.pop();
    }
    if poly.len() >= 3 {
        draw_polygon_mut(image, &poly, color);
    }
}

/// Ломаная линия заданной толщины в пикселях
pub fn draw_polyline(image: &mut RgbaImage, points: &[(f32, f32)], width: f32, color: Rgba<u8>) {
    if points.len() < 2 {
        return;
    }
    let half = width / 2.0;

    for pair in points.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        if segment_outside(image, a, b, half + 1.0) {
            continue;
        }
        if width <= THIN_LINE_PX {
            draw_line_segment_mut(image, a, b, color);
            continue;
        }

        let (dx, dy) = (b.0 - a.0, b.1 - a.1);
        let len = dx.hypot(dy);
        if len < f32::EPSILON {
            continue;
        }
        let (nx, ny) = (-dy / len * half, dx / len * half);
        fill_polygon(
            image,
            &[
                (a.0 + nx, a.1 + ny),
                (b.0 + nx, b.1 + ny),
                (b.0 - nx, b.1 - ny),
                (a.0 - nx, a.1 - ny),
            ],
            color,
        );
    }

    // скругление стыков
    if width > THIN_LINE_PX {
        let radius = half.round() as i32;
        for &(x, y) in points {
            if !segment_outside(image, (x, y), (x, y), half + 1.0) {
                draw_filled_circle_mut(image, (x.round() as i32, y.round() as i32), radius, color);
            }
        }
    }
}

/// Пунктир из точек вдоль ломаной (шаг `spacing` пикселей, сквозной по сегментам)
pub fn draw_dotted_polyline(
    image: &mut RgbaImage,
    points: &[(f32, f32)],
    width: f32,
    spacing: f32,
    color: Rgba<u8>,
) {
    let spacing = spacing.max(1.0);
    let radius = ((width - 1.0) / 2.0).round().max(0.0) as i32;
    // расстояние до следующей точки от начала текущего сегмента
    let mut next = 0.0_f32;

    for pair in points.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        let len = (b.0 - a.0).hypot(b.1 - a.1);
        if segment_outside(image, a, b, width + 1.0) {
            next = (next - len).rem_euclid(spacing);
            continue;
        }
        let mut t = next;
        while t <= len {
            let k = if len > 0.0 { t / len } else { 0.0 };
            let x = a.0 + (b.0 - a.0) * k;
            let y = a.1 + (b.1 - a.1) * k;
            draw_filled_circle_mut(image, (x.round() as i32, y.round() as i32), radius, color);
            t += spacing;
        }
        next = t - len;
    }
}

/// Заливка прямоугольника `[x0, x1) × [y0, y1)` со смешиванием по альфе
pub fn fill_rect_blended(image: &mut RgbaImage, x0: f32, y0: f32, x1: f32, y1: f32, color: Rgba<u8>) {
    let clamp_x = |v: f32| (v.round().max(0.0) as u32).min(image.width());
    let clamp_y = |v: f32| (v.round().max(0.0) as u32).min(image.height());
    let (mut left, mut top) = (clamp_x(x0), clamp_y(y0));
    let (mut right, mut bottom) = (clamp_x(x1), clamp_y(y1));
    // линия тоньше пикселя всё равно даёт один пиксель
    if right == left && x1 > x0 && right < image.width() {
        right += 1;
    }
    if bottom == top && y1 > y0 && bottom < image.height() {
        bottom += 1;
    }
    if left > right {
        std::mem::swap(&mut left, &mut right);
    }
    if top > bottom {
        std::mem::swap(&mut top, &mut bottom);
    }

    for y in top..bottom {
        for x in left..right {
            let px = image.get_pixel_mut(x, y);
            if color[3] == u8::MAX {
                *px = color;
            } else {
                px.blend(&color);
            }
        }
    }
}

/// Контур прямоугольника толщиной `width`, проведённый внутрь
pub fn stroke_rect(image: &mut RgbaImage, x: f32, y: f32, w: f32, h: f32, width: f32, color: Rgba<u8>) {
    let t = width.max(1.0);
    fill_rect_blended(image, x, y, x + w, y + t, color);
    fill_rect_blended(image, x, y + h - t, x + w, y + h, color);
    fill_rect_blended(image, x, y + t, x + t, y + h - t, color);
    fill_rect_blended(image, x + w - t, y + t, x + w, y + h - t, color);
}

/// Стрелка от `tail` к `tip`: стержень и треугольный наконечник
pub fn draw_arrow(
    image: &mut RgbaImage,
    tail: (f32, f32),
    tip: (f32, f32),
    shaft_width: f32,
    head_width: f32,
    head_length: f32,
    color: Rgba<u8>,
) {
    let (dx, dy) = (tip.0 - tail.0, tip.1 - tail.1);
    let len = dx.hypot(dy);
    if len < f32::EPSILON {
        return;
    }
    let (ux, uy) = (dx / len, dy / len);
    let head_length = head_length.min(len);
    let base = (tip.0 - ux * head_length, tip.1 - uy * head_length);

    if len > head_length {
        draw_polyline(image, &[tail, base], shaft_width, color);
    }
    let (nx, ny) = (-uy * head_width / 2.0, ux * head_width / 2.0);
    fill_polygon(
        image,
        &[tip, (base.0 + nx, base.1 + ny), (base.0 - nx, base.1 - ny)],
        color,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);

    fn count(image: &RgbaImage, color: Rgba<u8>) -> usize {
        image.pixels().filter(|p| **p == color).count()
    }

    #[test]
    fn thick_line_covers_its_width() {
        let mut image = RgbaImage::from_pixel(50, 50, WHITE);
        draw_polyline(&mut image, &[(5.0, 25.0), (45.0, 25.0)], 6.0, RED);
        for y in 23..=27 {
            assert_eq!(*image.get_pixel(25, y), RED, "y = {y}");
        }
        assert_eq!(*image.get_pixel(25, 15), WHITE);
    }

    #[test]
    fn lines_outside_the_image_are_ignored() {
        let mut image = RgbaImage::from_pixel(20, 20, WHITE);
        draw_polyline(&mut image, &[(-500.0, -500.0), (-400.0, -300.0)], 4.0, RED);
        draw_polyline(&mut image, &[(100.0, 5.0), (200.0, 5.0)], 1.0, RED);
        assert_eq!(count(&image, RED), 0);
    }

    #[test]
    fn degenerate_polygon_is_skipped() {
        let mut image = RgbaImage::from_pixel(10, 10, WHITE);
        fill_polygon(&mut image, &[(2.0, 2.0), (2.1, 2.2), (2.0, 2.0)], RED);
        assert_eq!(count(&image, RED), 0);
    }

    #[test]
    fn dotted_line_leaves_gaps() {
        let mut image = RgbaImage::from_pixel(100, 10, WHITE);
        draw_dotted_polyline(&mut image, &[(0.0, 5.0), (99.0, 5.0)], 1.0, 5.0, RED);
        let row: Vec<bool> = (0..100).map(|x| *image.get_pixel(x, 5) == RED).collect();
        assert!(row[0]);
        assert!(row[5]);
        assert!(!row[2]);
        assert_eq!(row.iter().filter(|&&on| on).count(), 20);
    }

    #[test]
    fn blended_fill_mixes_with_background() {
        let mut image = RgbaImage::from_pixel(4, 4, Rgba([0, 0, 0, 255]));
        fill_rect_blended(&mut image, 0.0, 0.0, 2.0, 2.0, Rgba([255, 255, 255, 128]));
        let px = image.get_pixel(0, 0);
        assert!(px[0] > 100 && px[0] < 160, "{px:?}");
        assert_eq!(px[3], 255);
        assert_eq!(*image.get_pixel(3, 3), Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn hairline_rect_still_draws() {
        let mut image = RgbaImage::from_pixel(10, 10, WHITE);
        fill_rect_blended(&mut image, 4.2, 0.0, 4.4, 10.0, RED);
        assert_eq!(count(&image, RED), 10);
    }

    #[test]
    fn frame_stroke_stays_inside() {
        let mut image = RgbaImage::from_pixel(10, 10, WHITE);
        stroke_rect(&mut image, 0.0, 0.0, 10.0, 10.0, 1.0, RED);
        assert_eq!(count(&image, RED), 36);
        assert_eq!(*image.get_pixel(5, 5), WHITE);
    }

    #[test]
    fn arrow_head_points_at_the_tip() {
        let mut image = RgbaImage::from_pixel(40, 60, WHITE);
        draw_arrow(&mut image, (20.0, 55.0), (20.0, 5.0), 3.0, 16.0, 15.0, RED);
        assert_eq!(*image.get_pixel(20, 8), RED);
        // наконечник шире стержня
        assert_eq!(*image.get_pixel(14, 19), RED);
        assert_eq!(*image.get_pixel(14, 40), WHITE);
    }
}
