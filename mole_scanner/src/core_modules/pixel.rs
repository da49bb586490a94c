// THEORY (Pixel and Full-Range HSV):
// The `Pixel` module is the most fundamental unit of the scanner. It is a
// "dumb" data container for a single RGBA pixel plus the two color transforms
// the rest of the engine relies on:
//
// - RGBA -> full-range HSV: the perceptual space used for color similarity.
//   "Full range" means every channel lives in 0..=255, including hue. The hue
//   circle is mapped onto 256 steps (not 180, not 360), so hue 255 sits right
//   next to hue 0 and the scale is cyclic.
// - full-range HSV -> RGBA: the inverse, used to turn a sampled perceptual
//   color back into something that can be painted on screen.
//
// Both directions use the same 256-step hue convention. A color that goes
// RGBA -> HSV -> RGBA -> HSV keeps saturation and value within one step. Hue
// only keeps that bound while saturation is at least `STABLE_HUE_SATURATION`:
// near-gray colors have so little chroma that the 8-bit RGB quantization moves
// the hue by several steps (RGB 233,233,242 goes from hue 171 to 175).
//
// Two HSV containers exist on purpose:
// - `HsvPixel` holds quantized 8-bit channels, exactly what a converted image
//   would store.
// - `HsvColor` holds `f64` channels. It is what you get when you average many
//   `HsvPixel`s (a mean is rarely an integer) and it is what the segmentation
//   stage consumes as its reference color.

pub mod pixel {
    pub type Byte = u8;
    pub type Channel = Byte;
    pub type HueDegrees = f64;
    pub type MeanChannel = f64;

    pub const CHANNELS: usize = 4;

    /// Number of hue steps on the full-range hue circle.
    pub const HUE_STEPS: f64 = 256.0;

    /// Lowest saturation at which hue survives an HSV -> RGBA -> HSV round trip within one step.
    pub const STABLE_HUE_SATURATION: Channel = 33;

    /// A "dumb" data container representing a single RGBA pixel.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Pixel {
        /// The red channel value (0-255).
        pub red: Channel,
        /// The green channel value (0-255).
        pub green: Channel,
        /// The blue channel value (0-255).
        pub blue: Channel,
        /// The alpha (transparency) channel value (0-255).
        pub alpha: Channel,
    }

    /// A pixel in full-range HSV, as an 8-bit image would store it.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct HsvPixel {
        pub hue: Channel,
        pub saturation: Channel,
        pub value: Channel,
    }

    /// A full-range HSV color with fractional channels.
    #[derive(Debug, Clone, Copy, PartialEq, Default, serde::Serialize, serde::Deserialize)]
    pub struct HsvColor {
        pub hue: MeanChannel,
        pub saturation: MeanChannel,
        pub value: MeanChannel,
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

        pub const fn opaque(red: Channel, green: Channel, blue: Channel) -> Self {
            Self::new(red, green, blue, 255)
        }

        /// Hue angle in degrees [0, 360).
        ///
        /// - Uses normalized sRGB channels, no linearization.
        /// - Gray pixels (zero chroma) report hue 0.
        pub fn hue_degrees(&self) -> HueDegrees {
            let red = self.red as f64 / 255.0;
            let green = self.green as f64 / 255.0;
            let blue = self.blue as f64 / 255.0;

            let maximum_channel = red.max(green.max(blue));
            let minimum_channel = red.min(green.min(blue));
            let chroma = maximum_channel - minimum_channel;

            if chroma <= 1e-12 {
                return 0.0;
            }

            let inverse_chroma = 1.0 / chroma;

            let (base_difference, sector_offset) = if maximum_channel == red {
                (green - blue, 0.0)
            } else if maximum_channel == green {
                (blue - red, 2.0)
            } else {
                (red - green, 4.0)
            };

            let mut hue_degrees = (base_difference * inverse_chroma + sector_offset) * 60.0;
            if hue_degrees < 0.0 {
                hue_degrees += 360.0;
            }
            hue_degrees
        }

        /// Converts this pixel to full-range HSV. Alpha is ignored.
        pub fn to_hsv(&self) -> HsvPixel {
            let maximum_channel = self.red.max(self.green.max(self.blue));
            let minimum_channel = self.red.min(self.green.min(self.blue));
            let chroma = (maximum_channel - minimum_channel) as f64;

            let saturation = if maximum_channel == 0 {
                0
            } else {
                (255.0 * chroma / maximum_channel as f64).round() as Channel
            };

            // 360 degrees rounds up to step 256, which wraps back to 0.
            let hue = ((self.hue_degrees() * HUE_STEPS / 360.0).round() as u32 % 256) as Channel;

            HsvPixel {
                hue,
                saturation,
                value: maximum_channel,
            }
        }
    }

    impl HsvPixel {
        pub const fn new(hue: Channel, saturation: Channel, value: Channel) -> Self {
            HsvPixel {
                hue,
                saturation,
                value,
            }
        }

        /// Converts back to an opaque RGBA pixel using the full-range hue scale.
        pub fn to_rgba(&self) -> Pixel {
            let value = self.value as f64 / 255.0;
            let saturation = self.saturation as f64 / 255.0;
            let sector_position = (self.hue as f64 * 360.0 / HUE_STEPS) / 60.0;
            let sector = sector_position.floor();
            let fraction = sector_position - sector;

            let p = value * (1.0 - saturation);
            let q = value * (1.0 - saturation * fraction);
            let t = value * (1.0 - saturation * (1.0 - fraction));

            let (red, green, blue) = match sector as u32 % 6 {
                0 => (value, t, p),
                1 => (q, value, p),
                2 => (p, value, t),
                3 => (p, q, value),
                4 => (t, p, value),
                _ => (value, p, q),
            };

            Pixel::opaque(to_channel(red * 255.0), to_channel(green * 255.0), to_channel(blue * 255.0))
        }
    }

    impl HsvColor {
        pub const fn new(hue: MeanChannel, saturation: MeanChannel, value: MeanChannel) -> Self {
            HsvColor {
                hue,
                saturation,
                value,
            }
        }

        /// Rounds and saturates each channel into an 8-bit HSV pixel.
        pub fn quantize(&self) -> HsvPixel {
            HsvPixel::new(
                to_channel(self.hue),
                to_channel(self.saturation),
                to_channel(self.value),
            )
        }

        /// Display color for this HSV color, computed as if it were a 1x1 8-bit image.
        pub fn to_rgba(&self) -> Pixel {
            self.quantize().to_rgba()
        }
    }

    impl From<HsvPixel> for HsvColor {
        fn from(pixel: HsvPixel) -> Self {
            HsvColor::new(pixel.hue as f64, pixel.saturation as f64, pixel.value as f64)
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

    #[inline]
    fn to_channel(value: f64) -> Channel {
        value.round().clamp(0.0, 255.0) as Channel
    }
}

#[cfg(test)]
mod tests {
    use super::pixel::*;

    fn hue_distance(a: u8, b: u8) -> u16 {
        let d = a.abs_diff(b) as u16;
        d.min(256 - d)
    }

    #[test]
    fn primaries_map_onto_the_256_step_circle() {
        assert_eq!(Pixel::opaque(255, 0, 0).to_hsv(), HsvPixel::new(0, 255, 255));
        assert_eq!(Pixel::opaque(0, 255, 0).to_hsv(), HsvPixel::new(85, 255, 255));
        assert_eq!(Pixel::opaque(0, 0, 255).to_hsv(), HsvPixel::new(171, 255, 255));
    }

    #[test]
    fn gray_has_no_hue_or_saturation() {
        let hsv = Pixel::opaque(128, 128, 128).to_hsv();
        assert_eq!(hsv, HsvPixel::new(0, 0, 128));
        assert_eq!(Pixel::opaque(0, 0, 0).to_hsv(), HsvPixel::new(0, 0, 0));
    }

    #[test]
    fn hue_wraps_instead_of_overflowing() {
        // Hue just below 360 degrees rounds to step 256 and must wrap to 0.
        let hsv = Pixel::opaque(255, 0, 1).to_hsv();
        assert_eq!(hsv.hue, 0);
    }

    #[test]
    fn round_trip_is_within_one_step() {
        for red in (0..=255u8).step_by(5) {
            for green in (0..=255u8).step_by(5) {
                for blue in (0..=255u8).step_by(5) {
                    let color = Pixel::opaque(red, green, blue);
                    let hsv = color.to_hsv();
                    let back = hsv.to_rgba().to_hsv();
                    assert!(hsv.saturation.abs_diff(back.saturation) <= 1, "{color:?}");
                    assert!(hsv.value.abs_diff(back.value) <= 1, "{color:?}");
                    if hsv.saturation >= STABLE_HUE_SATURATION {
                        assert!(hue_distance(hsv.hue, back.hue) <= 1, "{color:?}: {hsv:?} vs {back:?}");
                    }
                }
            }
        }
    }

    #[test]
    fn near_gray_hue_drifts() {
        let hsv = Pixel::opaque(233, 233, 242).to_hsv();
        assert_eq!(hsv, HsvPixel::new(171, 9, 242));
        assert!(hsv.saturation < STABLE_HUE_SATURATION);

        let back = hsv.to_rgba().to_hsv();
        assert_eq!(back, HsvPixel::new(175, 9, 242));
    }

    #[test]
    fn hsv_color_rounds_before_converting() {
        let color = HsvColor::new(0.4, 254.6, 254.5);
        assert_eq!(color.quantize(), HsvPixel::new(0, 255, 255));
        assert_eq!(color.to_rgba(), Pixel::opaque(255, 0, 0));
    }

    #[test]
    fn display_color_is_opaque() {
        assert_eq!(HsvColor::new(255.0, 0.0, 0.0).to_rgba(), Pixel::opaque(0, 0, 0));
    }
}
