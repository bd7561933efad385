/// Product thumbnails for chart markers and the product list
///
/// Downloads the product's small image, crops it to a square, resizes it and
/// cuts it to a disc so it can fill a circular marker.
use image::{imageops::FilterType, DynamicImage, Rgba, RgbaImage};
use tokio::task;

use crate::error::ThumbnailError;
use crate::lookup::read_limited;

/// Edge of generated thumbnails (square), at 2x the marker diameter
pub const THUMBNAIL_SIZE: u32 = 48;

/// Largest image accepted from the network
const MAX_THUMBNAIL_BYTES: usize = 2 * 1024 * 1024;

/// Disc-shaped RGBA image
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerImage {
    pub size: u32,
    pub pixels: Vec<u8>,
}

impl MarkerImage {
    pub fn handle(&self) -> iced::widget::image::Handle {
        iced::widget::image::Handle::from_rgba(self.size, self.size, self.pixels.clone())
    }
}

/// Download and prepare a product thumbnail
pub async fn fetch_marker_image(
    client: reqwest::Client,
    url: String,
) -> Result<MarkerImage, ThumbnailError> {
    let response = client
        .get(&url)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|e| ThumbnailError::Network(e.to_string()))?;

    let bytes = read_limited(response, MAX_THUMBNAIL_BYTES).await?;

    // Decoding and resampling are CPU-bound
    task::spawn_blocking(move || {
        let img = image::load_from_memory(&bytes).map_err(|e| ThumbnailError::Decode(e.to_string()))?;
        let disc = circular_thumbnail(&img, THUMBNAIL_SIZE);
        Ok(MarkerImage {
            size: THUMBNAIL_SIZE,
            pixels: disc.into_raw(),
        })
    })
    .await
    .map_err(|e| ThumbnailError::Decode(format!("Task join error: {}", e)))?
}

/// Centre-crop to a square of `size` and clear everything outside the disc
pub fn circular_thumbnail(img: &DynamicImage, size: u32) -> RgbaImage {
    let mut square = img.resize_to_fill(size, size, FilterType::Lanczos3).to_rgba8();

    let radius = size as f32 / 2.0;
    for (x, y, pixel) in square.enumerate_pixels_mut() {
        let dx = x as f32 + 0.5 - radius;
        let dy = y as f32 + 0.5 - radius;
        // One pixel of soft edge
        let coverage = (radius - (dx * dx + dy * dy).sqrt()).clamp(0.0, 1.0);
        let Rgba([r, g, b, a]) = *pixel;
        *pixel = Rgba([r, g, b, (a as f32 * coverage).round() as u8]);
    }

    square
}
