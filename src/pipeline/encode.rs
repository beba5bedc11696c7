//! Image encoding: `DynamicImage` → PNG, as a data URL or a binary blob.
//!
//! The images variant carries each page as a self-contained
//! `data:image/png;base64,…` string, which needs no archive and can be handed
//! around as text. The archive variant keeps raw PNG bytes so they can go
//! straight into the zip writer. PNG is lossless, so no compression tuning
//! happens here beyond the zoom factor chosen at render time.

use crate::config::OutputMode;
use crate::error::PageError;
use crate::output::{EncodedImage, PngPayload};
use crate::pipeline::archive;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

const DATA_URL_PREFIX: &str = "data:image/png;base64,";

/// Encode a bitmap as PNG bytes.
///
/// An empty bitmap is refused, the way a zero-sized canvas yields no image.
pub fn encode_png(page_num: usize, img: &DynamicImage) -> Result<Vec<u8>, PageError> {
    if img.width() == 0 || img.height() == 0 {
        return Err(PageError::EncodeFailed {
            page: page_num,
            detail: format!("empty bitmap ({}x{})", img.width(), img.height()),
        });
    }

    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|e| PageError::EncodeFailed {
            page: page_num,
            detail: e.to_string(),
        })?;

    debug!("Encoded page {} → {} bytes PNG", page_num, buf.len());
    Ok(buf)
}

/// Wrap PNG bytes in a `data:image/png;base64,` URL.
pub fn to_data_url(png: &[u8]) -> String {
    let mut url = String::with_capacity(DATA_URL_PREFIX.len() + png.len() * 4 / 3 + 4);
    url.push_str(DATA_URL_PREFIX);
    STANDARD.encode_string(png, &mut url);
    url
}

/// Recover the PNG bytes from a URL produced by [`to_data_url`].
pub fn decode_data_url(url: &str) -> Option<Vec<u8>> {
    let b64 = url.strip_prefix(DATA_URL_PREFIX)?;
    STANDARD.decode(b64).ok()
}

/// File name of a page in the images variant: `page-<n>.png`.
pub fn image_name(page_num: usize) -> String {
    format!("page-{page_num}.png")
}

/// Encode one rendered page into the form its output mode needs.
pub fn encode_page(
    page_num: usize,
    img: &DynamicImage,
    mode: OutputMode,
    total_pages: usize,
) -> Result<EncodedImage, PageError> {
    let png = encode_png(page_num, img)?;
    let (name, payload) = match mode {
        OutputMode::Images => (image_name(page_num), PngPayload::DataUrl(to_data_url(&png))),
        OutputMode::Archive => (
            archive::entry_name(page_num, total_pages),
            PngPayload::Binary(png),
        ),
    };

    Ok(EncodedImage {
        page_num,
        name,
        width: img.width(),
        height: img.height(),
        payload,
    })
}
