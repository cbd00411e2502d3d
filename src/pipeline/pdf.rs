//! PDF source extraction: page text plus embedded images via pdfium.
//!
//! pdfium is not async-safe, so all work happens inside `spawn_blocking`.
//! Each page contributes its text followed by one `![](images/…)` link per
//! embedded image object; the images are written as PNG files under
//! `output_dir/images/` and returned as already-resolved references.

use crate::error::EnhanceError;
use crate::output::ImageReference;
use pdfium_render::prelude::*;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Subdirectory of the output directory holding extracted page images.
pub const IMAGES_DIR: &str = "images";

/// Text and images pulled out of a PDF.
#[derive(Debug, Clone)]
pub struct PdfExtraction {
    /// Markdown-ish page text with image links, pages separated by a blank line.
    pub text: String,
    /// Extracted images, in page order.
    pub images: Vec<ImageReference>,
}

/// One page worth of extracted content.
struct PageContent {
    text: String,
    image_targets: Vec<String>,
}

/// Extract text and embedded images from `pdf_path`.
pub async fn extract_pdf(pdf_path: &Path, output_dir: &Path) -> Result<PdfExtraction, EnhanceError> {
    check_pdf_magic(pdf_path)?;

    let path = pdf_path.to_path_buf();
    let out = output_dir.to_path_buf();

    tokio::task::spawn_blocking(move || extract_pdf_blocking(&path, &out))
        .await
        .map_err(|e| EnhanceError::Internal(format!("PDF extraction task panicked: {}", e)))?
}

/// Reject files whose first bytes are not `%PDF`.
pub fn check_pdf_magic(path: &Path) -> Result<(), EnhanceError> {
    let mut file = std::fs::File::open(path).map_err(|_| EnhanceError::FileNotFound {
        path: path.to_path_buf(),
    })?;
    let mut magic = [0u8; 4];
    if file.read_exact(&mut magic).is_err() || &magic != b"%PDF" {
        return Err(EnhanceError::NotAPdf {
            path: path.to_path_buf(),
            magic,
        });
    }
    Ok(())
}

/// `page{N}_img{M}.png`, both 1-based.
pub fn page_image_name(page_num: usize, image_num: usize) -> String {
    format!("page{}_img{}.png", page_num, image_num)
}

fn extract_pdf_blocking(pdf_path: &Path, output_dir: &Path) -> Result<PdfExtraction, EnhanceError> {
    let pdfium = pdfium_auto::bind_pdfium_silent()
        .map_err(|e| EnhanceError::PdfiumBindingFailed(e.to_string()))?;

    let document = pdfium
        .load_pdf_from_file(pdf_path, None)
        .map_err(|e| EnhanceError::CorruptPdf {
            path: pdf_path.to_path_buf(),
            detail: format!("{:?}", e),
        })?;

    let images_dir = output_dir.join(IMAGES_DIR);
    std::fs::create_dir_all(&images_dir).map_err(|e| EnhanceError::OutputWriteFailed {
        path: images_dir.clone(),
        source: e,
    })?;

    let pages = document.pages();
    info!("PDF loaded: {} pages", pages.len());

    let mut contents = Vec::with_capacity(pages.len() as usize);
    let mut images = Vec::new();

    for (idx, page) in pages.iter().enumerate() {
        let page_num = idx + 1;
        let text = match page.text() {
            Ok(t) => t.all(),
            Err(e) => {
                warn!("Page {}: text extraction failed: {:?}", page_num, e);
                String::new()
            }
        };

        let mut image_targets = Vec::new();
        for object in page.objects().iter() {
            let Some(image_object) = object.as_image_object() else {
                continue;
            };
            let raw = match image_object.get_raw_image() {
                Ok(img) => img,
                Err(e) => {
                    warn!("Page {}: skipping unreadable image: {:?}", page_num, e);
                    continue;
                }
            };

            let name = page_image_name(page_num, image_targets.len() + 1);
            let path: PathBuf = images_dir.join(&name);
            if let Err(e) = raw.save_with_format(&path, image::ImageFormat::Png) {
                warn!("Page {}: cannot save {}: {}", page_num, path.display(), e);
                continue;
            }

            let target = format!("{}/{}", IMAGES_DIR, name);
            debug!("Extracted {} ({}x{})", target, raw.width(), raw.height());
            images.push(ImageReference::local(target.as_str(), path));
            image_targets.push(target);
        }

        contents.push(PageContent {
            text,
            image_targets,
        });
    }

    info!(
        "Extracted {} pages and {} images from {}",
        contents.len(),
        images.len(),
        pdf_path.display()
    );

    Ok(PdfExtraction {
        text: assemble_pages(&contents),
        images,
    })
}

/// Join pages with a blank line; each page's images follow its text.
fn assemble_pages(pages: &[PageContent]) -> String {
    pages
        .iter()
        .map(|page| {
            let mut block = page.text.trim().to_string();
            for target in &page.image_targets {
                if !block.is_empty() {
                    block.push_str("\n\n");
                }
                block.push_str(&format!("![]({})", target));
            }
            block
        })
        .filter(|block| !block.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}
