// src/render/text.rs
//! Подписи на карте
//!
//! Текст рисуется TrueType-шрифтом через `rusttype`. Шрифт обязателен:
//! без него сервис не создаётся, карта без подписей не строится.

use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_text_mut, text_size};
use rusttype::{Font, Scale};
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::config::{ConfigError, StyleSettings};

/// Где искать шрифт, если путь не задан явно
const SYSTEM_FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu-sans-fonts/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation-sans/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

fn read_font(path: &Path) -> Result<Font<'static>, ConfigError> {
    let bytes = fs::read(path).map_err(|e| ConfigError::Font {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    Font::try_from_vec(bytes).ok_or_else(|| ConfigError::Font {
        path: path.to_path_buf(),
        reason: "not a TrueType font".to_string(),
    })
}

/// Загружает шрифт для подписей
///
/// Явно заданный `font_path` обязан загрузиться. Иначе при `system_fonts = true`
/// берётся первый читаемый системный шрифт; если его нет, `ConfigError::NoFont`.
pub fn load_font(style: &StyleSettings) -> Result<Font<'static>, ConfigError> {
    if let Some(path) = &style.font_path {
        let font = read_font(path)?;
        debug!(path = %path.display(), "Шрифт загружен");
        return Ok(font);
    }
    if style.system_fonts {
        for candidate in SYSTEM_FONT_CANDIDATES {
            let path = Path::new(candidate);
            if !path.is_file() {
                continue;
            }
            if let Ok(font) = read_font(path) {
                debug!(path = candidate, "Системный шрифт");
                return Ok(font);
            }
        }
    }
    Err(ConfigError::NoFont)
}

/// Горизонтальная привязка текста к опорной точке
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HAlign {
    Left,
    Center,
    Right,
}

/// Вертикальная привязка текста к опорной точке
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VAlign {
    Top,
    Center,
    Bottom,
}

/// Размещённая строка: левый верхний угол и размер в пикселях
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    scale: f32,
}

/// Рисует строки заданного кегля (в пунктах) с привязкой к точке
#[derive(Clone, Copy)]
pub struct TextPainter<'f> {
    font: &'f Font<'static>,
    px_per_pt: f32,
}

impl<'f> TextPainter<'f> {
    #[must_use]
    pub fn new(font: &'f Font<'static>, px_per_pt: f32) -> Self {
        Self { font, px_per_pt }
    }

    /// Размещает строку; `None` для пустой строки
    #[must_use]
    pub fn place(
        &self,
        text: &str,
        size_pt: f32,
        (x, y): (f32, f32),
        h: HAlign,
        v: VAlign,
    ) -> Option<TextBox> {
        if text.is_empty() {
            return None;
        }
        let scale = size_pt * self.px_per_pt;
        let (w, ht) = text_size(Scale::uniform(scale), self.font, text);
        let (width, height) = (w as f32, ht as f32);
        let left = match h {
            HAlign::Left => x,
            HAlign::Center => x - width / 2.0,
            HAlign::Right => x - width,
        };
        let top = match v {
            VAlign::Top => y,
            VAlign::Center => y - height / 2.0,
            VAlign::Bottom => y - height,
        };
        Some(TextBox {
            x: left,
            y: top,
            width,
            height,
            scale,
        })
    }

    /// Рисует ранее размещённую строку
    pub fn draw_placed(&self, image: &mut RgbaImage, text: &str, placed: &TextBox, color: Rgba<u8>) {
        draw_text_mut(
            image,
            color,
            placed.x.round() as i32,
            placed.y.round() as i32,
            Scale::uniform(placed.scale),
            self.font,
            text,
        );
    }

    /// Размещает и сразу рисует строку
    pub fn draw(
        &self,
        image: &mut RgbaImage,
        text: &str,
        size_pt: f32,
        anchor: (f32, f32),
        (h, v): (HAlign, VAlign),
        color: Rgba<u8>,
    ) -> Option<TextBox> {
        let placed = self.place(text, size_pt, anchor, h, v)?;
        self.draw_placed(image, text, &placed, color);
        Some(placed)
    }
}

/// Шрифт из `tests/fixtures` для модульных тестов
#[cfg(test)]
pub(crate) fn fixture_font() -> Font<'static> {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/DejaVuSans.ttf");
    read_font(&path).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn no_system_fonts() -> StyleSettings {
        StyleSettings {
            system_fonts: false,
            ..StyleSettings::default()
        }
    }

    #[test]
    fn missing_font_is_an_error() {
        assert!(matches!(load_font(&no_system_fonts()), Err(ConfigError::NoFont)));
    }

    #[test]
    fn explicit_font_path_wins() {
        let style = StyleSettings {
            font_path: Some(Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/DejaVuSans.ttf")),
            ..no_system_fonts()
        };
        assert!(load_font(&style).is_ok());
    }

    #[test]
    fn explicit_font_path_must_load() {
        let dir = tempfile::tempdir().unwrap();
        let bogus = dir.path().join("bogus.ttf");
        std::fs::write(&bogus, b"not a font").unwrap();

        for path in [bogus, PathBuf::from("/definitely/missing.ttf")] {
            let style = StyleSettings {
                font_path: Some(path),
                ..no_system_fonts()
            };
            assert!(matches!(load_font(&style), Err(ConfigError::Font { .. })));
        }
    }

    #[test]
    fn alignment_moves_the_box() {
        let font = fixture_font();
        let painter = TextPainter::new(&font, 2.0);
        let centered = painter
            .place("Niger", 9.0, (100.0, 50.0), HAlign::Center, VAlign::Center)
            .unwrap();
        assert!(centered.width > 0.0 && centered.height > 0.0);
        assert!((centered.x + centered.width / 2.0 - 100.0).abs() < 1.0);

        let right = painter
            .place("Niger", 9.0, (100.0, 50.0), HAlign::Right, VAlign::Bottom)
            .unwrap();
        assert!((right.x + right.width - 100.0).abs() < 1e-3);
        assert!((right.y + right.height - 50.0).abs() < 1e-3);

        assert!(painter.place("", 9.0, (0.0, 0.0), HAlign::Left, VAlign::Top).is_none());
    }

    #[test]
    fn drawn_text_leaves_ink() {
        let font = fixture_font();
        let painter = TextPainter::new(&font, 2.0);
        let mut image = RgbaImage::from_pixel(80, 40, Rgba([255, 255, 255, 255]));
        let placed = painter
            .draw(
                &mut image,
                "N",
                12.0,
                (40.0, 20.0),
                (HAlign::Center, VAlign::Center),
                Rgba([0, 0, 0, 255]),
            )
            .unwrap();
        assert!(placed.width > 0.0);
        assert!(image.pixels().any(|p| p[0] < 128));
    }
}
