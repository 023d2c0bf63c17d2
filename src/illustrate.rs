// src/illustrate.rs
//! Illustration: keywords → image prompt → image endpoint → PNG bytes.
//!
//! Generation problems never fail a run; the service falls back to a plain placeholder PNG.

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use metrics::counter;

use crate::config::gazetteer::Gazetteer;
use crate::config::IllustratorConfig;
use crate::error::{BotError, Result};
use crate::keywords::{build_image_prompt, KeywordExtractor};

pub const PLACEHOLDER_WIDTH: u32 = 896;
pub const PLACEHOLDER_HEIGHT: u32 = 512;
pub const PLACEHOLDER_CAPTION: &str = "Error generando imagen";

const BACKGROUND: [u8; 3] = [128, 128, 128];
const BAND: [u8; 3] = [88, 88, 88];
const BAND_HEIGHT: u32 = 72;
const CAPTION_COLOR: [u8; 3] = [255, 255, 255];
const GLYPH_SCALE: u32 = 4;
const CAPTION_MARGIN: u32 = 16;

/// Turns a prompt into raw image bytes.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<Vec<u8>>;
}

/// Produces the image attached to a post.
#[async_trait]
pub trait Illustrator: Send + Sync {
    /// PNG bytes for `text`. `None` only when not even the placeholder could be encoded.
    async fn illustrate(&self, text: &str) -> Option<Vec<u8>>;
}

/// `GET {base}/prompt/{urlencoded prompt}`; any decodable format is re-encoded as PNG.
pub struct HttpImageGenerator {
    http: reqwest::Client,
    base_url: String,
}

impl HttpImageGenerator {
    pub fn new(cfg: &IllustratorConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("ai-news-bot/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .map_err(|e| BotError::Config(format!("http client: {e}")))?;
        Ok(Self {
            http,
            base_url: cfg.base_url.clone(),
        })
    }

    pub fn prompt_url(&self, prompt: &str) -> Result<reqwest::Url> {
        let mut url = reqwest::Url::parse(&self.base_url)
            .map_err(|e| BotError::Config(format!("illustrator base_url: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| BotError::Config("illustrator base_url cannot be a base".into()))?
            .pop_if_empty()
            .push("prompt")
            .push(prompt);
        Ok(url)
    }
}

#[async_trait]
impl ImageGenerator for HttpImageGenerator {
    async fn generate(&self, prompt: &str) -> Result<Vec<u8>> {
        let resp = self
            .http
            .get(self.prompt_url(prompt)?)
            .send()
            .await
            .map_err(|e| BotError::network("image", e.without_url()))?;
        if !resp.status().is_success() {
            return Err(BotError::network(
                "image",
                format!("HTTP {}", resp.status().as_u16()),
            ));
        }
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| BotError::network("image", e.without_url()))?;
        to_png(&bytes)
    }
}

/// Decode any supported format and re-encode as PNG.
pub fn to_png(bytes: &[u8]) -> Result<Vec<u8>> {
    let img = image::load_from_memory(bytes)
        .map_err(|e| BotError::malformed(format!("image body is not an image: {e}")))?;
    let mut out = Vec::new();
    img.write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)
        .map_err(|e| BotError::malformed(format!("png encode: {e}")))?;
    Ok(out)
}

/// 5x7 bitmap for `c`, one row per byte, bit 4 is the leftmost column. Lowercase is drawn as
/// uppercase; characters outside the table render as blank space.
fn glyph(c: char) -> [u8; 7] {
    match c.to_ascii_uppercase() {
        'A' => [0x0E, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11],
        'B' => [0x1E, 0x11, 0x11, 0x1E, 0x11, 0x11, 0x1E],
        'C' => [0x0E, 0x11, 0x10, 0x10, 0x10, 0x11, 0x0E],
        'D' => [0x1E, 0x11, 0x11, 0x11, 0x11, 0x11, 0x1E],
        'E' => [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x1F],
        'F' => [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x10],
        'G' => [0x0E, 0x11, 0x10, 0x17, 0x11, 0x11, 0x0F],
        'H' => [0x11, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11],
        'I' => [0x0E, 0x04, 0x04, 0x04, 0x04, 0x04, 0x0E],
        'J' => [0x07, 0x02, 0x02, 0x02, 0x02, 0x12, 0x0C],
        'K' => [0x11, 0x12, 0x14, 0x18, 0x14, 0x12, 0x11],
        'L' => [0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x1F],
        'M' => [0x11, 0x1B, 0x15, 0x15, 0x11, 0x11, 0x11],
        'N' => [0x11, 0x11, 0x19, 0x15, 0x13, 0x11, 0x11],
        'O' => [0x0E, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
        'P' => [0x1E, 0x11, 0x11, 0x1E, 0x10, 0x10, 0x10],
        'Q' => [0x0E, 0x11, 0x11, 0x11, 0x15, 0x12, 0x0D],
        'R' => [0x1E, 0x11, 0x11, 0x1E, 0x14, 0x12, 0x11],
        'S' => [0x0F, 0x10, 0x10, 0x0E, 0x01, 0x01, 0x1E],
        'T' => [0x1F, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04],
        'U' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
        'V' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x0A, 0x04],
        'W' => [0x11, 0x11, 0x11, 0x15, 0x15, 0x15, 0x0A],
        'X' => [0x11, 0x11, 0x0A, 0x04, 0x0A, 0x11, 0x11],
        'Y' => [0x11, 0x11, 0x11, 0x0A, 0x04, 0x04, 0x04],
        'Z' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x10, 0x1F],
        '0' => [0x0E, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0E],
        '1' => [0x04, 0x0C, 0x04, 0x04, 0x04, 0x04, 0x0E],
        '2' => [0x0E, 0x11, 0x01, 0x02, 0x04, 0x08, 0x1F],
        '3' => [0x1F, 0x02, 0x04, 0x02, 0x01, 0x11, 0x0E],
        '4' => [0x02, 0x06, 0x0A, 0x12, 0x1F, 0x02, 0x02],
        '5' => [0x1F, 0x10, 0x1E, 0x01, 0x01, 0x11, 0x0E],
        '6' => [0x06, 0x08, 0x10, 0x1E, 0x11, 0x11, 0x0E],
        '7' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08],
        '8' => [0x0E, 0x11, 0x11, 0x0E, 0x11, 0x11, 0x0E],
        '9' => [0x0E, 0x11, 0x11, 0x0F, 0x01, 0x02, 0x0C],
        _ => [0; 7],
    }
}

/// Draw `text` into the bottom band, left-aligned and vertically centered; clipped at the edge.
fn draw_caption(img: &mut image::RgbImage, text: &str) {
    let (w, h) = img.dimensions();
    let advance = 6 * GLYPH_SCALE;
    let top = h - BAND_HEIGHT + (BAND_HEIGHT - 7 * GLYPH_SCALE) / 2;
    let mut left = CAPTION_MARGIN;
    for c in text.chars() {
        if left + 5 * GLYPH_SCALE > w {
            break;
        }
        for (row, bits) in glyph(c).iter().enumerate() {
            for col in 0..5u32 {
                if bits & (0x10 >> col) == 0 {
                    continue;
                }
                let x0 = left + col * GLYPH_SCALE;
                let y0 = top + row as u32 * GLYPH_SCALE;
                for dy in 0..GLYPH_SCALE {
                    for dx in 0..GLYPH_SCALE {
                        img.put_pixel(x0 + dx, y0 + dy, image::Rgb(CAPTION_COLOR));
                    }
                }
            }
        }
        left += advance;
    }
}

/// Gray 896x512 PNG with a darker band at the bottom carrying `caption` in white.
/// The caption is also stored in a tEXt chunk.
pub fn placeholder_png(caption: &str) -> Result<Vec<u8>> {
    let (w, h) = (PLACEHOLDER_WIDTH, PLACEHOLDER_HEIGHT);
    let mut img = image::RgbImage::from_fn(w, h, |_, y| {
        image::Rgb(if y >= h - BAND_HEIGHT { BAND } else { BACKGROUND })
    });
    draw_caption(&mut img, caption);

    let encode_err = |e: png::EncodingError| BotError::malformed(format!("placeholder png: {e}"));
    let mut out = Vec::new();
    {
        let mut enc = png::Encoder::new(&mut out, w, h);
        enc.set_color(png::ColorType::Rgb);
        enc.set_depth(png::BitDepth::Eight);
        enc.add_text_chunk("Description".to_string(), caption.to_string())
            .map_err(encode_err)?;
        let mut writer = enc.write_header().map_err(encode_err)?;
        writer.write_image_data(img.as_raw()).map_err(encode_err)?;
        writer.finish().map_err(encode_err)?;
    }
    Ok(out)
}

/// Keyword extraction + prompt building + generation, with placeholder fallback.
pub struct IllustrationService {
    extractor: Arc<dyn KeywordExtractor>,
    gazetteer: Arc<Gazetteer>,
    generator: Arc<dyn ImageGenerator>,
}

impl IllustrationService {
    pub fn new(
        extractor: Arc<dyn KeywordExtractor>,
        gazetteer: Arc<Gazetteer>,
        generator: Arc<dyn ImageGenerator>,
    ) -> Self {
        Self {
            extractor,
            gazetteer,
            generator,
        }
    }
}

#[async_trait]
impl Illustrator for IllustrationService {
    async fn illustrate(&self, text: &str) -> Option<Vec<u8>> {
        let keywords = self.extractor.extract(text).await;
        let prompt = build_image_prompt(&keywords, &self.gazetteer);
        tracing::info!(keywords = ?keywords, "image prompt built");

        match self.generator.generate(&prompt).await {
            Ok(png) => Some(png),
            Err(e) => {
                counter!("illustrator_fallback_total").increment(1);
                tracing::warn!(error = %e, "image generation failed; using placeholder");
                placeholder_png(PLACEHOLDER_CAPTION)
                    .inspect_err(|e| tracing::error!(error = %e, "placeholder failed"))
                    .ok()
            }
        }
    }
}
