//! Image encoding: image file → base64 data wrapped in `ImageData`.
//!
//! VLM APIs accept images as base64 data-URIs embedded in the JSON request
//! body. The bytes are sent as-is; only the MIME type is sniffed so the data
//! URI matches the payload (a JPEG labelled `image/png` is rejected by some
//! providers).

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::ImageFormat;
use std::path::Path;
use tracing::debug;

/// Read an image file and encode it for the vision model.
pub async fn encode_image_file(path: &Path) -> std::io::Result<ImageData> {
    let bytes = tokio::fs::read(path).await?;
    let mime = sniff_mime(&bytes, path);
    let b64 = STANDARD.encode(&bytes);
    debug!(
        "Encoded {} ({}) → {} bytes base64",
        path.display(),
        mime,
        b64.len()
    );
    Ok(ImageData::new(b64, mime))
}

/// Detect the MIME type from magic bytes, falling back to the extension and
/// finally to PNG.
pub fn sniff_mime(bytes: &[u8], path: &Path) -> &'static str {
    if let Ok(format) = image::guess_format(bytes) {
        return format.to_mime_type();
    }
    path.extension()
        .and_then(|ext| ext.to_str())
        .and_then(ImageFormat::from_extension)
        .map(|f| f.to_mime_type())
        .unwrap_or("image/png")
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgba, RgbaImage};
    use std::io::Cursor;

    fn png_bytes() -> Vec<u8> {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 4, Rgba([255, 0, 0, 255])));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .expect("png encode");
        buf
    }

    #[test]
    fn sniff_uses_magic_bytes_over_extension() {
        assert_eq!(sniff_mime(&png_bytes(), Path::new("photo.jpg")), "image/png");
    }

    #[test]
    fn sniff_falls_back_to_extension() {
        assert_eq!(sniff_mime(b"not an image", Path::new("a.jpeg")), "image/jpeg");
        assert_eq!(sniff_mime(b"not an image", Path::new("noext")), "image/png");
    }

    #[tokio::test]
    async fn encode_small_image_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("red.png");
        std::fs::write(&path, png_bytes()).unwrap();

        let data = encode_image_file(&path).await.expect("encode should succeed");
        assert_eq!(data.mime_type, "image/png");
        let decoded = STANDARD.decode(&data.data).expect("valid base64");
        assert_eq!(decoded, png_bytes());
    }

    #[tokio::test]
    async fn encode_missing_file_errors() {
        let err = encode_image_file(Path::new("/definitely/not/here.png")).await;
        assert!(err.is_err());
    }
}
