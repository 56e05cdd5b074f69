//! Image encoding between the renderer, the pipeline and the VLM request.
//!
//! Rendered slides are stored as PNG bytes in a [`PageImage`]; the request
//! adapter turns those into base64 [`ImageData`]. PNG keeps slide text crisp,
//! which matters more to the model than payload size.

use crate::document::PageImage;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Encode a rasterised slide as PNG.
pub fn encode_png(img: &DynamicImage) -> Result<PageImage, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    debug!("Encoded {}x{} slide → {} PNG bytes", img.width(), img.height(), buf.len());
    Ok(PageImage::new(buf, "image/png"))
}

/// Wrap page image bytes as a base64 attachment with `detail: "high"`.
///
/// High detail lets GPT-4-class models tile the image instead of reading a
/// single downscaled overview, which loses small slide text.
pub fn to_image_data(image: &PageImage) -> ImageData {
    let b64 = STANDARD.encode(&image.bytes);
    ImageData::new(b64, image.mime_type.as_str()).with_detail("high")
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn encode_small_image() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(8, 6, Rgba([0, 0, 255, 255])));
        let page_image = encode_png(&img).expect("encode should succeed");
        assert_eq!(page_image.mime_type, "image/png");
        assert_eq!(&page_image.bytes[1..4], b"PNG");
    }

    #[test]
    fn image_data_is_base64_of_bytes() {
        let page_image = PageImage::new(vec![1, 2, 3, 4], "image/png");
        let data = to_image_data(&page_image);
        assert_eq!(data.mime_type, "image/png");
        assert_eq!(STANDARD.decode(&data.data).expect("valid base64"), vec![1, 2, 3, 4]);
    }
}
