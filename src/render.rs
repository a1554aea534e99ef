use crate::color::Color;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageBuffer, ImageEncoder, RgbaImage};
use qrcode::{Color as Module, QrCode};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

/// Directory used by [`save_png`] when the caller does not name one.
pub const DEFAULT_OUTPUT_DIR: &str = "generated";

/// Errors raised while rendering or exporting a QR code.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("failed to encode QR code: {0}")]
    Encode(String),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Largest quiet zone [`ModuleRenderer`] accepts, in modules.
pub const MAX_MARGIN_MODULES: u32 = 16;

/// Appearance of a rendered QR code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    /// Target width (and height) in pixels.
    pub width: u32,
    /// Quiet zone around the symbol, in modules.
    pub margin_modules: u32,
    pub foreground: Color,
    pub background: Color,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            width: 200,
            margin_modules: 1,
            foreground: Color::BRAND,
            background: Color::WHITE,
        }
    }
}

/// Turns a payload string into a raster image.
///
/// Implementations must report a payload they cannot encode as [`RenderError::Encode`]
/// rather than panicking. The generator calls this on a blocking thread.
pub trait QrRenderer: Send + Sync + 'static {
    fn render(&self, payload: &str, options: &RenderOptions) -> Result<RgbaImage, RenderError>;
}

/// Default renderer: symbol encoding by the `qrcode` crate, module painting here.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModuleRenderer;

impl QrRenderer for ModuleRenderer {
    /// Renders `payload` onto a `width` x `width` canvas.
    ///
    /// Modules get a fractional number of pixels so the symbol plus its margin fills the canvas
    /// exactly. When `width` is smaller than the symbol plus margin, one pixel per module is used
    /// and the image is larger than requested.
    fn render(&self, payload: &str, options: &RenderOptions) -> Result<RgbaImage, RenderError> {
        let border = options.margin_modules;
        if border > MAX_MARGIN_MODULES {
            return Err(RenderError::Encode(format!(
                "margin of {border} modules exceeds the maximum of {MAX_MARGIN_MODULES}"
            )));
        }

        let qr = QrCode::new(payload.as_bytes()).map_err(|e| RenderError::Encode(e.to_string()))?;
        let modules = qr.width() as u32;
        let span = border
            .checked_mul(2)
            .and_then(|m| m.checked_add(modules))
            .ok_or_else(|| RenderError::Encode("symbol dimensions overflow".into()))?;
        let size = options.width.max(span);
        let scale = f64::from(size) / f64::from(span);
        let margin_px = f64::from(border) * scale;
        debug!(modules, scale, size, "rendering QR symbol");

        let dark = options.foreground.to_rgba();
        let light = options.background.to_rgba();
        let mut img: RgbaImage = ImageBuffer::new(size, size);

        let module_at = |p: u32| -> Option<usize> {
            let offset = f64::from(p) - margin_px;
            if offset < 0.0 {
                return None;
            }
            let index = (offset / scale).floor() as u32;
            (index < modules).then_some(index as usize)
        };

        for (x, y, pixel) in img.enumerate_pixels_mut() {
            let is_dark = match (module_at(x), module_at(y)) {
                (Some(qr_x), Some(qr_y)) => qr[(qr_x, qr_y)] == Module::Dark,
                _ => false,
            };
            *pixel = if is_dark { dark } else { light };
        }

        Ok(img)
    }
}

/*---- Utilities ----*/

/// Encodes an image as PNG bytes.
pub fn to_png_bytes(img: &RgbaImage) -> Result<Vec<u8>, RenderError> {
    let mut png = Vec::new();
    PngEncoder::new(&mut png).write_image(
        img.as_raw(),
        img.width(),
        img.height(),
        ExtendedColorType::Rgba8,
    )?;
    Ok(png)
}

/// Encodes an image as a `data:image/png;base64,` URL, suitable for copying to a clipboard or
/// storing alongside a history record.
pub fn to_data_url(img: &RgbaImage) -> Result<String, RenderError> {
    let png = to_png_bytes(img)?;
    Ok(format!("data:image/png;base64,{}", STANDARD.encode(png)))
}

/// Default download name for a generated code, based on the current time.
pub fn default_file_name() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    format!("qr-code-{millis}")
}

/// Saves an image as PNG and returns the path written.
///
/// # Arguments
///
/// * `img` - The image to save.
/// * `directory_path` - Optional. The directory the image is saved in. Defaults to
///   [`DEFAULT_OUTPUT_DIR`]. Created if missing.
/// * `filename` - Optional. The file name, with or without the `.png` extension. Defaults to
///   [`default_file_name`].
///
/// # Errors
///
/// Returns a [`RenderError`] if the directory cannot be created or the image cannot be written.
///
/// # Example
///
/// ```rust,no_run
/// use qrcraft::render::{save_png, ModuleRenderer, QrRenderer, RenderOptions};
///
/// let img = ModuleRenderer.render("Hello, World!", &RenderOptions::default()).unwrap();
/// let path = save_png(&img, Some("images".as_ref()), Some("qr_code")).unwrap();
/// println!("saved to {}", path.display());
/// ```
pub fn save_png(
    img: &RgbaImage,
    directory_path: Option<&Path>,
    filename: Option<&str>,
) -> Result<PathBuf, RenderError> {
    let directory_path = directory_path.unwrap_or_else(|| Path::new(DEFAULT_OUTPUT_DIR));
    let filename = match filename {
        Some(name) => name.trim_end_matches(".png").to_owned(),
        None => default_file_name(),
    };

    // Check if the directory exists, create it if it doesn't
    if !directory_path.exists() {
        fs::create_dir_all(directory_path)?;
    }

    let file_path = directory_path.join(format!("{filename}.png"));
    fs::write(&file_path, to_png_bytes(img)?)?;
    Ok(file_path)
}
