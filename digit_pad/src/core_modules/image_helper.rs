pub mod image_helper {
    use crate::core_modules::pixel::pixel::CHANNELS;
    use crate::error::{ConfigurationError, PadResult};
    use image::{DynamicImage, ImageEncoder};
    use std::path::Path;

    /// Writes a square RGBA buffer to `path` as PNG.
    pub fn save_rgba(path: impl AsRef<Path>, side: u32, buffer: &[u8]) -> PadResult<()> {
        let expected = side as usize * side as usize * CHANNELS;
        if buffer.len() != expected {
            return Err(ConfigurationError::BufferLength {
                expected,
                actual: buffer.len(),
            }
            .into());
        }
        let output = std::fs::File::create(path)?;
        let encoder = image::codecs::png::PngEncoder::new(output);

        encoder.write_image(buffer, side, side, image::ExtendedColorType::Rgba8)?;

        Ok(())
    }

    /// Decodes an image file, any format the `image` crate understands.
    pub fn open_image(path: impl AsRef<Path>) -> PadResult<DynamicImage> {
        Ok(image::open(path)?)
    }
}
