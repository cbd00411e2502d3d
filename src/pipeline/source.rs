//! Source loading: turn the input file into Markdown text plus a document
//! directory for relative image lookup.
//!
//! | Extension | Handling |
//! |-----------|----------|
//! | `.md`     | read as UTF-8; images resolved later |
//! | `.zip`    | extract to `output_dir/extracted`, pick the largest `.md` |
//! | `.pdf`    | pdfium text + embedded images (see [`crate::pipeline::pdf`]) |

use crate::error::EnhanceError;
use crate::output::ImageReference;
use crate::pipeline::pdf;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Subdirectory of the output directory that receives archive contents.
pub const EXTRACT_DIR: &str = "extracted";

/// Suffix of files this tool writes; never picked as a source.
pub const ENHANCED_SUFFIX: &str = "_enhanced.md";

/// A loaded source document.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    /// Markdown text to enhance.
    pub text: String,
    /// Directory that relative image targets are resolved against.
    pub document_dir: PathBuf,
    /// Images already known to the loader (PDF extraction). `None` means the
    /// text still has to go through the resolver.
    pub images: Option<Vec<ImageReference>>,
}

/// Supported input kinds, decided by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Markdown,
    Zip,
    Pdf,
}

impl SourceKind {
    /// Classify `path` by its (case-insensitive) extension.
    pub fn from_path(path: &Path) -> Result<Self, EnhanceError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "md" => Ok(Self::Markdown),
            "zip" => Ok(Self::Zip),
            "pdf" => Ok(Self::Pdf),
            _ => Err(EnhanceError::UnsupportedFileType {
                extension: if ext.is_empty() {
                    "(none)".to_string()
                } else {
                    format!(".{}", ext)
                },
            }),
        }
    }
}

/// Load `input` into a [`SourceDocument`].
pub async fn load_source(input: &Path, output_dir: &Path) -> Result<SourceDocument, EnhanceError> {
    if !input.is_file() {
        return Err(EnhanceError::FileNotFound {
            path: input.to_path_buf(),
        });
    }

    match SourceKind::from_path(input)? {
        SourceKind::Markdown => {
            info!("Processing Markdown file: {}", input.display());
            load_markdown(input).await
        }
        SourceKind::Zip => {
            info!("Processing zip archive: {}", input.display());
            let extract_dir = output_dir.join(EXTRACT_DIR);
            let md_path = extract_archive(input, &extract_dir).await?;
            load_markdown(&md_path).await
        }
        SourceKind::Pdf => {
            info!("Processing PDF: {}", input.display());
            let extraction = pdf::extract_pdf(input, output_dir).await?;
            Ok(SourceDocument {
                text: extraction.text,
                document_dir: output_dir.to_path_buf(),
                images: Some(extraction.images),
            })
        }
    }
}

async fn load_markdown(path: &Path) -> Result<SourceDocument, EnhanceError> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| EnhanceError::ReadFailed {
            path: path.to_path_buf(),
            source: e,
        })?;
    let document_dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    debug!("Loaded {} chars from {}", text.len(), path.display());
    Ok(SourceDocument {
        text,
        document_dir,
        images: None,
    })
}

/// Extract `archive` into `extract_dir` and return the main Markdown file.
pub async fn extract_archive(archive: &Path, extract_dir: &Path) -> Result<PathBuf, EnhanceError> {
    let archive = archive.to_path_buf();
    let dest = extract_dir.to_path_buf();

    tokio::task::spawn_blocking(move || {
        unzip_blocking(&archive, &dest)?;
        find_main_markdown(&dest)?.ok_or(EnhanceError::NoMarkdownInArchive { path: archive })
    })
    .await
    .map_err(|e| EnhanceError::Internal(format!("Archive task panicked: {}", e)))?
}

fn unzip_blocking(archive: &Path, dest: &Path) -> Result<(), EnhanceError> {
    let failed = |detail: String| EnhanceError::ArchiveExtractFailed {
        path: archive.to_path_buf(),
        detail,
    };

    let file = std::fs::File::open(archive).map_err(|e| failed(e.to_string()))?;
    let mut zip = zip::ZipArchive::new(file).map_err(|e| failed(e.to_string()))?;
    std::fs::create_dir_all(dest).map_err(|e| failed(e.to_string()))?;
    // `extract` refuses entries that would escape `dest`.
    zip.extract(dest).map_err(|e| failed(e.to_string()))?;

    info!("Extracted {} entries to {}", zip.len(), dest.display());
    Ok(())
}

/// The largest `*.md` file under `root`, ignoring previously written
/// `_enhanced.md` outputs. Ties keep the first file found.
pub fn find_main_markdown(root: &Path) -> Result<Option<PathBuf>, EnhanceError> {
    let mut best: Option<(u64, PathBuf)> = None;
    let mut stack = vec![root.to_path_buf()];

    while let Some(dir) = stack.pop() {
        let entries = std::fs::read_dir(&dir).map_err(|e| EnhanceError::ReadFailed {
            path: dir.clone(),
            source: e,
        })?;
        let mut entries: Vec<_> = entries.filter_map(Result::ok).map(|e| e.path()).collect();
        entries.sort();

        for path in entries {
            if path.is_dir() {
                stack.push(path);
                continue;
            }
            if !is_source_markdown(&path) {
                continue;
            }
            let size = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
            if best.as_ref().map_or(true, |(s, _)| size > *s) {
                best = Some((size, path));
            }
        }
    }

    if let Some((size, ref path)) = best {
        debug!("Main Markdown file: {} ({} bytes)", path.display(), size);
    }
    Ok(best.map(|(_, p)| p))
}

fn is_source_markdown(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    name.to_ascii_lowercase().ends_with(".md") && !name.ends_with(ENHANCED_SUFFIX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_zip(path: &Path, files: &[(&str, &str)]) {
        let file = std::fs::File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default();
        for (name, body) in files {
            zip.start_file(*name, options).unwrap();
            zip.write_all(body.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn kinds_by_extension() {
        assert_eq!(SourceKind::from_path(Path::new("a.MD")).unwrap(), SourceKind::Markdown);
        assert_eq!(SourceKind::from_path(Path::new("a.zip")).unwrap(), SourceKind::Zip);
        assert_eq!(SourceKind::from_path(Path::new("a.pdf")).unwrap(), SourceKind::Pdf);
        assert!(matches!(
            SourceKind::from_path(Path::new("a.docx")),
            Err(EnhanceError::UnsupportedFileType { ref extension }) if extension == ".docx"
        ));
    }

    #[test]
    fn enhanced_outputs_are_not_sources() {
        assert!(is_source_markdown(Path::new("/x/notes.md")));
        assert!(!is_source_markdown(Path::new("/x/notes_enhanced.md")));
        assert!(!is_source_markdown(Path::new("/x/notes.txt")));
    }

    #[tokio::test]
    async fn missing_input_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_source(&dir.path().join("nope.md"), dir.path()).await.unwrap_err();
        assert!(matches!(err, EnhanceError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn markdown_document_dir_is_parent() {
        let dir = tempfile::tempdir().unwrap();
        let md = dir.path().join("doc.md");
        std::fs::write(&md, "# Hi\n").unwrap();
        let doc = load_source(&md, dir.path()).await.unwrap();
        assert_eq!(doc.text, "# Hi\n");
        assert_eq!(doc.document_dir, dir.path());
        assert!(doc.images.is_none());
    }

    #[tokio::test]
    async fn zip_picks_largest_markdown() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("bundle.zip");
        write_zip(
            &archive,
            &[
                ("readme.md", "short"),
                ("book/main.md", "# Main\nthe longest markdown file in here\n"),
                ("book/main_enhanced.md", &"x".repeat(500)),
                ("book/img/a.png", "png"),
            ],
        );

        let out = dir.path().join("out");
        let doc = load_source(&archive, &out).await.unwrap();
        assert!(doc.text.starts_with("# Main"));
        assert_eq!(doc.document_dir, out.join(EXTRACT_DIR).join("book"));
        assert!(out.join(EXTRACT_DIR).join("book/img/a.png").is_file());
    }

    #[tokio::test]
    async fn zip_without_markdown_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("pics.zip");
        write_zip(&archive, &[("a.png", "png"), ("notes.txt", "hi")]);

        let err = load_source(&archive, &dir.path().join("out")).await.unwrap_err();
        assert!(matches!(err, EnhanceError::NoMarkdownInArchive { .. }));
        assert_eq!(
            err.to_string(),
            format!("No Markdown file found in the archive '{}'", archive.display())
        );
    }

    #[tokio::test]
    async fn corrupt_zip_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("broken.zip");
        std::fs::write(&archive, b"not a zip").unwrap();
        let err = load_source(&archive, dir.path()).await.unwrap_err();
        assert!(matches!(err, EnhanceError::ArchiveExtractFailed { .. }));
    }
}
