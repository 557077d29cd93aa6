//! Per-frame PNG files.

use crate::persist::{PersistError, SessionLayout};
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{ExtendedColorType, ImageEncoder, RgbImage};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

/// Writes frame images into `<session>/frames/`.
#[derive(Debug, Clone)]
pub struct FrameStore {
    session_dir: PathBuf,
}

impl FrameStore {
    pub fn new(layout: &SessionLayout) -> Self {
        Self {
            session_dir: layout.dir().to_path_buf(),
        }
    }

    /// Encode and store one frame, returning its session-relative path.
    ///
    /// The image is written under a temporary name and renamed into place, so
    /// the final file is either complete or absent.
    pub fn save(&self, frame_id: u64, image: &RgbImage) -> Result<String, PersistError> {
        let rel = SessionLayout::frame_rel_path(frame_id);
        let final_path = self.session_dir.join(&rel);
        let tmp_path = final_path.with_extension("png.part");

        let mut out = BufWriter::new(File::create(&tmp_path)?);
        let encoder =
            PngEncoder::new_with_quality(&mut out, CompressionType::Fast, FilterType::Adaptive);
        encoder.write_image(
            image.as_raw(),
            image.width(),
            image.height(),
            ExtendedColorType::Rgb8,
        )?;
        out.flush()?;
        drop(out);

        std::fs::rename(&tmp_path, &final_path)?;
        Ok(rel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_save_frame() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = SessionLayout::from_dir(tmp.path());
        layout.create_dirs().unwrap();
        let store = FrameStore::new(&layout);

        let img = RgbImage::from_pixel(4, 3, Rgb([10, 20, 30]));
        let rel = store.save(12, &img).unwrap();

        assert_eq!(rel, "frames/000012.png");
        let path = tmp.path().join(&rel);
        assert_eq!(image::image_dimensions(&path).unwrap(), (4, 3));
        assert!(!path.with_extension("png.part").exists());
    }
}
