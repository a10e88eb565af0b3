use std::{collections::VecDeque, fmt, path::PathBuf};

use image::RgbImage;

use crate::error::SourceError;

/// Where a photo is picked from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceKind {
    Camera,
    PhotoLibrary,
    SavedPhotosAlbum,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SourceKind::Camera => "Camera",
            SourceKind::PhotoLibrary => "Photo Library",
            SourceKind::SavedPhotosAlbum => "Photos Album",
        })
    }
}

/// Supplies picked or captured photos.
pub trait ImageSourceAdapter {
    fn is_available(&self, kind: SourceKind) -> bool;

    /// Yields one image, or `None` when the user cancelled.
    fn pick(&mut self, kind: SourceKind) -> Result<Option<RgbImage>, SourceError>;
}

/// A photo library backed by image files, handed out in order.
///
/// There is no camera; once the queue is exhausted every pick is a cancel.
#[derive(Debug, Default)]
pub struct FileImageSource {
    queue: VecDeque<PathBuf>,
}

impl FileImageSource {
    pub fn new(paths: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            queue: paths.into_iter().collect(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.queue.len()
    }
}

impl ImageSourceAdapter for FileImageSource {
    fn is_available(&self, kind: SourceKind) -> bool {
        kind != SourceKind::Camera
    }

    fn pick(&mut self, kind: SourceKind) -> Result<Option<RgbImage>, SourceError> {
        if !self.is_available(kind) {
            return Err(SourceError::Unavailable(kind));
        }
        let Some(path) = self.queue.pop_front() else {
            return Ok(None);
        };
        log::debug!("Picked {} from {kind}", path.display());
        let bytes = std::fs::read(&path)?;
        Ok(Some(image::load_from_memory(&bytes)?.to_rgb8()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_names_match_picker_wording() {
        assert_eq!(SourceKind::Camera.to_string(), "Camera");
        assert_eq!(SourceKind::PhotoLibrary.to_string(), "Photo Library");
        assert_eq!(SourceKind::SavedPhotosAlbum.to_string(), "Photos Album");
        assert_eq!(
            SourceError::Unavailable(SourceKind::Camera).to_string(),
            "Sorry, Camera source type is not available."
        );
    }

    #[test]
    fn camera_is_unavailable() {
        let mut source = FileImageSource::new([PathBuf::from("a.png")]);
        assert!(matches!(
            source.pick(SourceKind::Camera),
            Err(SourceError::Unavailable(SourceKind::Camera))
        ));
        assert_eq!(source.remaining(), 1);
    }

    #[test]
    fn exhausted_library_is_a_cancel() {
        let mut source = FileImageSource::default();
        assert!(source.pick(SourceKind::PhotoLibrary).unwrap().is_none());
    }

    #[test]
    fn picks_decode_files_in_order() {
        let dir = std::env::temp_dir().join(format!("flower-guru-source-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let wide = dir.join("wide.png");
        let tall = dir.join("tall.png");
        RgbImage::new(4, 2).save(&wide).unwrap();
        RgbImage::new(2, 4).save(&tall).unwrap();

        let mut source = FileImageSource::new([wide, tall, dir.join("missing.png")]);
        let first = source.pick(SourceKind::PhotoLibrary).unwrap().unwrap();
        let second = source.pick(SourceKind::SavedPhotosAlbum).unwrap().unwrap();
        assert_eq!(first.dimensions(), (4, 2));
        assert_eq!(second.dimensions(), (2, 4));
        assert!(matches!(
            source.pick(SourceKind::PhotoLibrary),
            Err(SourceError::Io(_))
        ));

        let _ = std::fs::remove_dir_all(dir);
    }
}
