//! Logo overlay.
//!
//! The logo is drawn centered on the code, over a white square that extends [`LOGO_PADDING`]
//! pixels past it on every side so the logo stays readable against dark modules. Use a high
//! enough error correction level, or a small logo, to keep the code scannable.

use std::fmt;
use std::path::Path;

use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgba, RgbaImage};
use tracing::debug;

/// Margin of the white backing square around the logo, in pixels.
pub const LOGO_PADDING: u32 = 5;

#[derive(Debug, thiserror::Error)]
pub enum ComposeError {
    #[error("logo size must be between {min}% and {max}%, got {0}%", min = LogoSize::MIN, max = LogoSize::MAX)]
    LogoSizeOutOfRange(u8),

    #[error("failed to read logo {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode logo: {0}")]
    Decode(#[from] image::ImageError),
}

/// Logo width as a percentage of the code width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct LogoSize(u8);

impl LogoSize {
    pub const MIN: u8 = 10;
    pub const MAX: u8 = 50;

    pub fn new(percent: u8) -> Result<Self, ComposeError> {
        if (Self::MIN..=Self::MAX).contains(&percent) {
            Ok(Self(percent))
        } else {
            Err(ComposeError::LogoSizeOutOfRange(percent))
        }
    }

    pub fn percent(self) -> u8 {
        self.0
    }

    /// Logo side length for a code `base_width` pixels wide.
    pub fn side_for(self, base_width: u32) -> u32 {
        base_width * u32::from(self.0) / 100
    }
}

impl Default for LogoSize {
    fn default() -> Self {
        Self(20)
    }
}

impl fmt::Display for LogoSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

/// Draws `logo` centered on `base`.
///
/// # Arguments
///
/// * `base` - The rendered code. Returned unchanged when `logo` is `None`.
/// * `logo` - Optional logo image; it is scaled to a square `size` percent of the base width.
/// * `size` - Logo size as a percentage of the base width.
///
/// # Example
///
/// ```rust
/// use image::{DynamicImage, RgbaImage, Rgba};
/// use qrcraft::compose::{overlay_logo, LogoSize};
///
/// let base = RgbaImage::from_pixel(100, 100, Rgba([0, 0, 0, 255]));
/// let logo = DynamicImage::ImageRgba8(RgbaImage::from_pixel(8, 8, Rgba([255, 0, 0, 255])));
/// let out = overlay_logo(base, Some(&logo), LogoSize::new(20).unwrap());
/// // 20px logo at (40, 40), white backing from 35 to 65.
/// assert_eq!(out.get_pixel(36, 36), &Rgba([255, 255, 255, 255]));
/// assert_eq!(out.get_pixel(10, 10), &Rgba([0, 0, 0, 255]));
/// ```
pub fn overlay_logo(base: RgbaImage, logo: Option<&DynamicImage>, size: LogoSize) -> RgbaImage {
    let Some(logo) = logo else {
        return base;
    };

    let mut out = base;
    let (width, height) = out.dimensions();
    let side = size.side_for(width);
    if side == 0 {
        return out;
    }
    let x = width.saturating_sub(side) / 2;
    let y = height.saturating_sub(side) / 2;
    debug!(side, x, y, "overlaying logo");

    // White backing square, clamped to the image bounds.
    let white = Rgba([255, 255, 255, 255]);
    let left = x.saturating_sub(LOGO_PADDING);
    let top = y.saturating_sub(LOGO_PADDING);
    let right = (x + side + LOGO_PADDING).min(width);
    let bottom = (y + side + LOGO_PADDING).min(height);
    for py in top..bottom {
        for px in left..right {
            out.put_pixel(px, py, white);
        }
    }

    let scaled = imageops::resize(&logo.to_rgba8(), side, side, FilterType::Lanczos3);
    imageops::overlay(&mut out, &scaled, i64::from(x), i64::from(y));
    out
}

/// Reads and decodes a logo file without blocking the runtime.
pub async fn load_logo(path: impl AsRef<Path>) -> Result<DynamicImage, ComposeError> {
    let path = path.as_ref();
    let bytes = tokio::fs::read(path).await.map_err(|source| ComposeError::Read {
        path: path.display().to_string(),
        source,
    })?;
    Ok(image::load_from_memory(&bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);
    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);

    fn black(size: u32) -> RgbaImage {
        RgbaImage::from_pixel(size, size, BLACK)
    }

    fn is_red(pixel: &Rgba<u8>) -> bool {
        let [r, g, b, a] = pixel.0;
        r > 240 && g < 16 && b < 16 && a > 240
    }

    fn red_logo() -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(16, 16, RED))
    }

    #[test]
    fn logo_size_range_is_enforced() {
        assert!(LogoSize::new(9).is_err());
        assert!(LogoSize::new(51).is_err());
        assert_eq!(LogoSize::new(10).unwrap().percent(), 10);
        assert_eq!(LogoSize::new(50).unwrap().percent(), 50);
        assert_eq!(LogoSize::default().percent(), 20);
    }

    #[test]
    fn without_logo_base_is_unchanged() {
        let base = black(40);
        let out = overlay_logo(base.clone(), None, LogoSize::default());
        assert_eq!(out, base);
    }

    #[test]
    fn logo_is_centered_on_white_backing() {
        // 200px base, 20% logo: 40px logo at (80, 80), backing from 75 to 125.
        let out = overlay_logo(black(200), Some(&red_logo()), LogoSize::new(20).unwrap());

        assert!(is_red(out.get_pixel(80, 80)));
        assert!(is_red(out.get_pixel(119, 119)));
        assert!(is_red(out.get_pixel(100, 100)));

        assert_eq!(*out.get_pixel(75, 75), WHITE);
        assert_eq!(*out.get_pixel(79, 100), WHITE);
        assert_eq!(*out.get_pixel(124, 124), WHITE);

        assert_eq!(*out.get_pixel(74, 74), BLACK);
        assert_eq!(*out.get_pixel(125, 100), BLACK);
        assert_eq!(*out.get_pixel(0, 0), BLACK);
    }

    #[test]
    fn transparent_logo_shows_backing() {
        let clear = DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 4, Rgba([0, 0, 0, 0])));
        let out = overlay_logo(black(100), Some(&clear), LogoSize::new(50).unwrap());
        assert_eq!(*out.get_pixel(50, 50), WHITE);
    }

    #[test]
    fn backing_is_clamped_to_small_images() {
        let out = overlay_logo(black(12), Some(&red_logo()), LogoSize::new(50).unwrap());
        assert_eq!(out.dimensions(), (12, 12));
        assert_eq!(*out.get_pixel(0, 0), WHITE);
        assert!(is_red(out.get_pixel(6, 6)));
    }

    #[tokio::test]
    async fn load_logo_reads_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logo.png");
        red_logo().save(&path).unwrap();

        let logo = load_logo(&path).await.unwrap();
        assert_eq!(logo.width(), 16);
    }

    #[tokio::test]
    async fn load_logo_reports_missing_file() {
        let err = load_logo("/definitely/not/here.png").await.unwrap_err();
        assert!(matches!(err, ComposeError::Read { .. }));
    }
}
