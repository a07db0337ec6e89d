use std::path::Path;
use std::time::Duration;

use base64::Engine;
use image::codecs::jpeg::JpegDecoder;
use image::{ExtendedColorType, GenericImageView, ImageDecoder};
use thiserror::Error;

use crate::error::ReportFillError;

/// Why an image locator could not be turned into pixels. Never surfaces past
/// [`resolve_image`]; it exists so the cause can be logged.
#[derive(Debug, Error)]
pub enum ImageLoadError {
    #[error("empty image locator")]
    Empty,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("http status {0}")]
    Status(u16),
    #[error("malformed data uri")]
    DataUri,
    #[error("cannot read {0}: {1}")]
    File(String, std::io::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Capability that retrieves remote image bytes. Implementations must give up
/// within a bounded time rather than block the page being rendered.
pub trait ImageFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, ImageLoadError>;
}

pub struct HttpImageFetcher {
    client: reqwest::blocking::Client,
}

impl HttpImageFetcher {
    pub fn new(timeout: Duration) -> Result<Self, ReportFillError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

impl ImageFetcher for HttpImageFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, ImageLoadError> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| ImageLoadError::Transport(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ImageLoadError::Status(status.as_u16()));
        }
        let bytes = response
            .bytes()
            .map_err(|e| ImageLoadError::Transport(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

/// Fetcher that refuses every request; used when network access is off.
pub struct OfflineFetcher;

impl ImageFetcher for OfflineFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, ImageLoadError> {
        Err(ImageLoadError::Transport(format!("offline, not fetching {url}")))
    }
}

/// Pixel data in the shape a PDF image XObject wants.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageData {
    pub width: u32,
    pub height: u32,
    pub color_space: &'static str,
    /// `Some("DCTDecode")` when `data` is a JPEG passed through untouched;
    /// `None` when `data` is raw 8-bit samples.
    pub filter: Option<&'static str>,
    pub data: Vec<u8>,
    /// Raw 8-bit alpha samples, present only when some pixel is not opaque.
    pub alpha: Option<Vec<u8>>,
}

/// Loads and decodes the image a locator points at. Every failure, whether
/// transport, status, timeout or decode, comes back as `None`.
pub fn resolve_image(locator: &str, fetcher: &dyn ImageFetcher) -> Option<ImageData> {
    match load_image(locator, fetcher) {
        Ok(image) => Some(image),
        Err(err) => {
            log::debug!("image {locator:?} unavailable: {err}");
            None
        }
    }
}

fn load_image(locator: &str, fetcher: &dyn ImageFetcher) -> Result<ImageData, ImageLoadError> {
    let locator = locator.trim();
    if locator.is_empty() {
        return Err(ImageLoadError::Empty);
    }
    if locator.starts_with("data:") {
        let (mime, data) = parse_data_uri(locator).ok_or(ImageLoadError::DataUri)?;
        return decode_image_bytes(&data, Some(&mime));
    }
    if locator.starts_with("http://") || locator.starts_with("https://") {
        let bytes = fetcher.fetch(locator)?;
        return decode_image_bytes(&bytes, None);
    }
    let bytes = std::fs::read(Path::new(locator))
        .map_err(|e| ImageLoadError::File(locator.to_string(), e))?;
    decode_image_bytes(&bytes, None)
}

pub fn decode_image_bytes(data: &[u8], mime: Option<&str>) -> Result<ImageData, ImageLoadError> {
    let format = match mime {
        Some(mime) if mime.contains("png") => Some(image::ImageFormat::Png),
        Some(mime) if mime.contains("jpeg") || mime.contains("jpg") => {
            Some(image::ImageFormat::Jpeg)
        }
        _ => image::guess_format(data).ok(),
    };

    let decoded =
        image::load_from_memory(data).map_err(|e| ImageLoadError::Decode(e.to_string()))?;
    let (width, height) = decoded.dimensions();
    if width == 0 || height == 0 {
        return Err(ImageLoadError::Decode("zero-sized image".to_string()));
    }

    let passthrough = if matches!(format, Some(image::ImageFormat::Jpeg)) {
        JpegDecoder::new(std::io::Cursor::new(data))
            .ok()
            .and_then(|d| dct_color_space(d.original_color_type()))
    } else {
        None
    };
    if let Some(color_space) = passthrough {
        return Ok(ImageData {
            width,
            height,
            color_space,
            filter: Some("DCTDecode"),
            data: data.to_vec(),
            alpha: None,
        });
    }

    let rgba = decoded.to_rgba8();
    let mut rgb = Vec::with_capacity((width * height * 3) as usize);
    let mut alpha = Vec::with_capacity((width * height) as usize);
    let mut has_alpha = false;
    for pixel in rgba.pixels() {
        let [r, g, b, a] = pixel.0;
        if a != 255 {
            has_alpha = true;
        }
        rgb.extend_from_slice(&[r, g, b]);
        alpha.push(a);
    }

    Ok(ImageData {
        width,
        height,
        color_space: "DeviceRGB",
        filter: None,
        data: rgb,
        alpha: has_alpha.then_some(alpha),
    })
}

/// Color space for embedding a JPEG stream as-is. CMYK and other layouts
/// the decoder converted on the way in are re-encoded instead.
fn dct_color_space(original: ExtendedColorType) -> Option<&'static str> {
    match original {
        ExtendedColorType::L8 => Some("DeviceGray"),
        ExtendedColorType::Rgb8 => Some("DeviceRGB"),
        _ => None,
    }
}

fn parse_data_uri(uri: &str) -> Option<(String, Vec<u8>)> {
    let rest = uri.strip_prefix("data:")?;
    let (header, data_part) = rest.split_once(',')?;
    let mime = header
        .split(';')
        .next()
        .filter(|m| !m.is_empty())
        .unwrap_or("application/octet-stream")
        .to_string();
    let data = if header.contains("base64") {
        base64::engine::general_purpose::STANDARD
            .decode(data_part.trim())
            .ok()?
    } else {
        data_part.as_bytes().to_vec()
    };
    Some((mime, data))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::io::Cursor;

    /// Serves canned bytes per URL and records every request.
    #[derive(Default)]
    pub(crate) struct StubFetcher {
        pub responses: HashMap<String, Vec<u8>>,
        pub requests: RefCell<Vec<String>>,
    }

    impl ImageFetcher for StubFetcher {
        fn fetch(&self, url: &str) -> Result<Vec<u8>, ImageLoadError> {
            self.requests.borrow_mut().push(url.to_string());
            self.responses
                .get(url)
                .cloned()
                .ok_or(ImageLoadError::Status(404))
        }
    }

    pub(crate) fn png_bytes(width: u32, height: u32, alpha: u8) -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(width, height, image::Rgba([200, 10, 10, alpha]));
        let mut out = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut out, image::ImageFormat::Png)
            .expect("encode png");
        out.into_inner()
    }

    #[test]
    fn decodes_opaque_png_as_rgb_without_alpha() {
        let img = decode_image_bytes(&png_bytes(4, 2, 255), None).expect("decode");
        assert_eq!((img.width, img.height), (4, 2));
        assert_eq!(img.data.len(), 4 * 2 * 3);
        assert_eq!(img.filter, None);
        assert!(img.alpha.is_none());
    }

    #[test]
    fn keeps_alpha_channel_when_translucent() {
        let img = decode_image_bytes(&png_bytes(3, 3, 128), None).expect("decode");
        assert_eq!(img.alpha.as_ref().map(Vec::len), Some(9));
    }

    #[test]
    fn jpeg_passes_through_as_dct() {
        let img = image::RgbImage::from_pixel(8, 8, image::Rgb([1, 2, 3]));
        let mut out = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut out, image::ImageFormat::Jpeg)
            .expect("encode jpeg");
        let bytes = out.into_inner();
        let decoded = decode_image_bytes(&bytes, None).expect("decode");
        assert_eq!(decoded.filter, Some("DCTDecode"));
        assert_eq!(decoded.data, bytes);
    }

    #[test]
    fn only_gray_and_rgb_jpegs_pass_through() {
        assert_eq!(dct_color_space(ExtendedColorType::L8), Some("DeviceGray"));
        assert_eq!(dct_color_space(ExtendedColorType::Rgb8), Some("DeviceRGB"));
        assert_eq!(dct_color_space(ExtendedColorType::Cmyk8), None);
    }

    #[test]
    fn gray_jpeg_keeps_its_color_space() {
        let img = image::GrayImage::from_pixel(8, 8, image::Luma([90]));
        let mut out = Cursor::new(Vec::new());
        image::DynamicImage::ImageLuma8(img)
            .write_to(&mut out, image::ImageFormat::Jpeg)
            .expect("encode jpeg");
        let decoded = decode_image_bytes(&out.into_inner(), None).expect("decode");
        assert_eq!(decoded.filter, Some("DCTDecode"));
        assert_eq!(decoded.color_space, "DeviceGray");
    }

    #[test]
    fn data_uri_locators_decode() {
        let encoded = base64::engine::general_purpose::STANDARD.encode(png_bytes(2, 2, 255));
        let uri = format!("data:image/png;base64,{encoded}");
        let img = resolve_image(&uri, &OfflineFetcher).expect("image");
        assert_eq!(img.width, 2);
    }

    #[test]
    fn failures_resolve_to_none() {
        let fetcher = StubFetcher::default();
        assert!(resolve_image("", &fetcher).is_none());
        assert!(resolve_image("https://example.invalid/a.png", &fetcher).is_none());
        assert!(resolve_image("data:image/png;base64,@@@", &fetcher).is_none());
        assert!(resolve_image("/definitely/not/here.png", &fetcher).is_none());
        assert_eq!(fetcher.requests.borrow().len(), 1);
    }

    #[test]
    fn garbage_bytes_from_network_resolve_to_none() {
        let mut fetcher = StubFetcher::default();
        fetcher
            .responses
            .insert("http://host/x.jpg".to_string(), b"<html>nope</html>".to_vec());
        assert!(resolve_image("http://host/x.jpg", &fetcher).is_none());
    }

    #[test]
    fn local_files_are_read() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("photo.png");
        std::fs::write(&path, png_bytes(5, 1, 255)).expect("write");
        let img = resolve_image(path.to_str().expect("utf8"), &OfflineFetcher).expect("image");
        assert_eq!((img.width, img.height), (5, 1));
    }
}
