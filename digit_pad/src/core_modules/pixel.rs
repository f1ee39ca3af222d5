// THEORY (Single-Pixel Intensity):
// The `Pixel` module is the smallest unit of the reducer. It is a "dumb" data
// container for one RGBA sample as read off a canvas, plus the single heuristic the
// digit model cares about: how bright the pixel is.
//
// Brightness here is the unweighted mean of R, G and B. It is deliberately not a
// perceptual luma (Rec. 601 or similar): the model was trained on canvases reduced
// with the plain average, so any other weighting would shift its inputs. Alpha is
// carried along for rendering but never contributes to intensity.

pub mod pixel {
    pub type Byte = u8;
    pub type Channel = Byte;
    pub type Intensity = u8;

    /// Number of bytes per pixel in a canvas buffer (R, G, B, A).
    pub const CHANNELS: usize = 4;

    /// A "dumb" data container representing a single RGBA pixel.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Pixel {
        /// The red channel value (0-255).
        pub red: Channel,
        /// The green channel value (0-255).
        pub green: Channel,
        /// The blue channel value (0-255).
        pub blue: Channel,
        /// The alpha (transparency) channel value (0-255). Ignored by `intensity`.
        pub alpha: Channel,
    }

    impl Pixel {
        pub const fn new(red: Channel, green: Channel, blue: Channel, alpha: Channel) -> Self {
            Pixel {
                red,
                green,
                blue,
                alpha,
            }
        }

        /// An opaque gray pixel with all three colour channels set to `value`.
        pub const fn gray(value: Intensity) -> Self {
            Pixel::new(value, value, value, Channel::MAX)
        }

        /// Unweighted grayscale average, rounded to the nearest integer.
        ///
        /// Normalizing to 0..1 and scaling back by 255 is the identity, so this is
        /// `round((R + G + B) / 3)`. The fractional part of a third is never one
        /// half, which makes `(sum + 1) / 3` an exact integer rounding.
        pub fn intensity(&self) -> Intensity {
            let sum = self.red as u32 + self.green as u32 + self.blue as u32;
            ((sum + 1) / 3) as Intensity
        }
    }

    impl From<[Byte; CHANNELS]> for Pixel {
        fn from(bytes: [Byte; CHANNELS]) -> Self {
            Pixel::new(bytes[0], bytes[1], bytes[2], bytes[3])
        }
    }

    impl From<Pixel> for [Byte; CHANNELS] {
        fn from(pixel: Pixel) -> Self {
            [pixel.red, pixel.green, pixel.blue, pixel.alpha]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::pixel::*;

    #[test]
    fn intensity_is_plain_channel_average() {
        assert_eq!(Pixel::new(30, 60, 90, 255).intensity(), 60);
        assert_eq!(Pixel::new(255, 255, 255, 0).intensity(), 255);
        assert_eq!(Pixel::new(0, 0, 0, 255).intensity(), 0);
    }

    #[test]
    fn intensity_rounds_to_nearest() {
        // 1/3 rounds down, 2/3 rounds up.
        assert_eq!(Pixel::new(1, 0, 0, 255).intensity(), 0);
        assert_eq!(Pixel::new(1, 1, 0, 255).intensity(), 1);
        assert_eq!(Pixel::new(100, 100, 101, 255).intensity(), 100);
        assert_eq!(Pixel::new(100, 101, 101, 255).intensity(), 101);
    }

    #[test]
    fn alpha_does_not_change_intensity() {
        let opaque = Pixel::new(12, 200, 7, 255);
        let clear = Pixel::new(12, 200, 7, 0);
        assert_eq!(opaque.intensity(), clear.intensity());
    }

    #[test]
    fn converts_to_and_from_bytes() {
        let pixel = Pixel::from([1, 2, 3, 4]);
        assert_eq!(pixel, Pixel::new(1, 2, 3, 4));
        let bytes: [Byte; CHANNELS] = Pixel::gray(9).into();
        assert_eq!(bytes, [9, 9, 9, 255]);
    }
}
