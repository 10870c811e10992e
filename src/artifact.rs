// src/artifact.rs
//! Сохранение скомпонованной карты в PNG
//!
//! Файл сначала пишется во временный файл в каталоге назначения и затем
//! атомарно переименовывается в `<file_stem>-<request_id>.png`. Читатель
//! никогда не видит недописанный файл; одинаковые запросы перезаписывают
//! один и тот же путь, разные запросы пишут в разные.

use image::ImageOutputFormat;
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::debug;

use crate::compose::Composition;
use crate::config::OutputSettings;

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("Failed to create output directory {path}: {source}")]
    CreateDir { path: PathBuf, source: io::Error },

    #[error("Failed to write map image in {path}: {source}")]
    Io { path: PathBuf, source: io::Error },

    #[error("Failed to encode map image: {0}")]
    Encode(#[from] image::ImageError),

    #[error("Failed to save map image to {path}: {source}")]
    Persist { path: PathBuf, source: io::Error },
}

/// Готовый файл карты
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub path: PathBuf,
    pub request_id: String,
    pub width: u32,
    pub height: u32,
}

/// Пишет фигуры в каталог артефактов
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    directory: PathBuf,
    file_stem: String,
}

impl ArtifactWriter {
    #[must_use]
    pub fn new(settings: &OutputSettings) -> Self {
        Self {
            directory: settings.directory.clone(),
            file_stem: settings.file_stem.clone(),
        }
    }

    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Путь артефакта для запроса
    #[must_use]
    pub fn path_for(&self, request_id: &str) -> PathBuf {
        self.directory
            .join(format!("{}-{request_id}.png", self.file_stem))
    }

    /// Кодирует фигуру в PNG и атомарно кладёт её на место
    pub fn write(&self, composition: &Composition, request_id: &str) -> Result<Artifact, ArtifactError> {
        fs::create_dir_all(&self.directory).map_err(|source| ArtifactError::CreateDir {
            path: self.directory.clone(),
            source,
        })?;

        let io_error = |source| ArtifactError::Io {
            path: self.directory.clone(),
            source,
        };
        let mut tmp = NamedTempFile::new_in(&self.directory).map_err(io_error)?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            composition
                .image
                .write_to(&mut writer, ImageOutputFormat::Png)?;
            writer.flush().map_err(io_error)?;
        }

        let path = self.path_for(request_id);
        tmp.persist(&path).map_err(|e| ArtifactError::Persist {
            path: path.clone(),
            source: e.error,
        })?;
        debug!(path = %path.display(), "Артефакт записан");

        Ok(Artifact {
            path,
            request_id: request_id.to_string(),
            width: composition.image.width(),
            height: composition.image.height(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::Layout;
    use crate::extent::Extent;
    use crate::render::PixelRect;
    use image::{Rgba, RgbaImage};

    fn composition(color: Rgba<u8>) -> Composition {
        let rect = PixelRect::new(0.0, 0.0, 4.0, 3.0);
        let extent = Extent::new(0.0, 1.0, 0.0, 1.0);
        Composition {
            image: RgbaImage::from_pixel(4, 3, color),
            layout: Layout {
                figure_size: (4, 3),
                main_rect: rect,
                inset_rect: rect,
                main_extent: extent,
                inset_extent: extent,
                inset_continent: "Africa".to_string(),
                main_zoom: 7,
                inset_zoom: 2,
                crop: [0, 0, 4, 3],
            },
        }
    }

    fn writer(dir: &Path) -> ArtifactWriter {
        ArtifactWriter::new(&OutputSettings {
            directory: dir.join("nested").join("out"),
            file_stem: "map_preview".to_string(),
        })
    }

    #[test]
    fn writes_png_under_request_name() {
        let dir = tempfile::tempdir().unwrap();
        let writer = writer(dir.path());
        let artifact = writer
            .write(&composition(Rgba([1, 2, 3, 255])), "0123456789abcdef")
            .unwrap();

        assert_eq!(
            artifact.path,
            writer.directory().join("map_preview-0123456789abcdef.png")
        );
        assert_eq!((artifact.width, artifact.height), (4, 3));
        let decoded = image::open(&artifact.path).unwrap().to_rgba8();
        assert_eq!(*decoded.get_pixel(2, 1), Rgba([1, 2, 3, 255]));

        // временных файлов не остаётся
        let entries = fs::read_dir(writer.directory()).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[test]
    fn same_request_overwrites_other_requests_do_not() {
        let dir = tempfile::tempdir().unwrap();
        let writer = writer(dir.path());
        let a = writer.write(&composition(Rgba([0, 0, 0, 255])), "aaaa").unwrap();
        let again = writer.write(&composition(Rgba([9, 9, 9, 255])), "aaaa").unwrap();
        let b = writer.write(&composition(Rgba([0, 0, 0, 255])), "bbbb").unwrap();

        assert_eq!(a.path, again.path);
        assert_ne!(a.path, b.path);
        let decoded = image::open(&a.path).unwrap().to_rgba8();
        assert_eq!(*decoded.get_pixel(0, 0), Rgba([9, 9, 9, 255]));
    }

    #[test]
    fn unwritable_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, b"x").unwrap();
        let writer = ArtifactWriter::new(&OutputSettings {
            directory: blocker.join("sub"),
            file_stem: "map".to_string(),
        });
        let err = writer.write(&composition(Rgba([0, 0, 0, 255])), "id").unwrap_err();
        assert!(matches!(err, ArtifactError::CreateDir { .. }));
    }
}
