//! Image reference resolution: Markdown image links → local image files.
//!
//! Every unique `![alt](target)` target is classified as remote (`http://`,
//! `https://`) or local. Remote images are downloaded into a scratch
//! directory because the vision request embeds the bytes; local ones are
//! looked up relative to the document's directory. Anything that cannot be
//! resolved is dropped with a warning. Resolution runs sequentially.

use crate::config::EnhanceConfig;
use crate::error::ImageError;
use crate::output::ImageReference;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

/// Browser-like agent; several image CDNs reject non-browser clients.
const USER_AGENT: &str = "Mozilla/5.0";

/// Subdirectory of the output directory that receives remote images.
pub const DOWNLOAD_DIR: &str = "downloaded_images";

/// Basename used when a URL has no usable last path segment.
const FALLBACK_BASENAME: &str = "downloaded_img";

static RE_IMAGE_LINK: Lazy<Regex> = Lazy::new(|| Regex::new(r"!\[.*?\]\((.*?)\)").unwrap());

/// Check if the target looks like a URL.
pub fn is_url(target: &str) -> bool {
    target.starts_with("http://") || target.starts_with("https://")
}

/// All unique image-link targets, in order of first appearance.
pub fn extract_image_targets(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    RE_IMAGE_LINK
        .captures_iter(text)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
        .filter(|target| seen.insert(target.clone()))
        .collect()
}

/// Resolve every unique image target in `text`.
///
/// Local targets are joined onto `document_dir`; remote targets are
/// downloaded into `scratch_dir`, which is created on first use. Returns
/// only the references that resolved.
pub async fn resolve_images(
    text: &str,
    document_dir: &Path,
    scratch_dir: &Path,
    config: &EnhanceConfig,
) -> Vec<ImageReference> {
    let targets = extract_image_targets(text);
    let mut resolved = Vec::with_capacity(targets.len());
    let mut client: Option<reqwest::Client> = None;

    for target in &targets {
        let outcome = if is_url(target) {
            let client = client.get_or_insert_with(|| build_client(config.download_timeout_secs));
            download_image(client, target, scratch_dir)
                .await
                .map(|path| ImageReference::remote(target.as_str(), path))
        } else {
            resolve_local(target, document_dir)
        };

        match outcome {
            Ok(image) => {
                debug!("Resolved {} → {}", target, image.resolved_location.display());
                resolved.push(image);
            }
            Err(e) => warn!("{}", e),
        }
    }

    let dropped = targets.len() - resolved.len();
    info!(
        "Found {} unique image references: {} resolved, {} dropped",
        targets.len(),
        resolved.len(),
        dropped
    );
    resolved
}

fn build_client(timeout_secs: u64) -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .unwrap_or_else(|e| {
            warn!("HTTP client setup failed, using defaults: {}", e);
            reqwest::Client::new()
        })
}

/// Resolve a local target against the document directory.
fn resolve_local(target: &str, document_dir: &Path) -> Result<ImageReference, ImageError> {
    let path = document_dir.join(target);
    if path.is_file() {
        Ok(ImageReference::local(target, path))
    } else {
        Err(ImageError::NotFound {
            target: target.to_string(),
            path,
        })
    }
}

/// Download a remote image into `scratch_dir`.
async fn download_image(
    client: &reqwest::Client,
    url: &str,
    scratch_dir: &Path,
) -> Result<PathBuf, ImageError> {
    let failed = |reason: String| ImageError::DownloadFailed {
        url: url.to_string(),
        reason,
    };

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| failed(e.to_string()))?;

    if !response.status().is_success() {
        return Err(failed(format!("HTTP {}", response.status())));
    }

    let bytes = response.bytes().await.map_err(|e| failed(e.to_string()))?;

    tokio::fs::create_dir_all(scratch_dir)
        .await
        .map_err(|e| failed(format!("cannot create {}: {}", scratch_dir.display(), e)))?;

    let path = unique_path(scratch_dir, &remote_file_name(url, unix_timestamp()));
    tokio::fs::write(&path, &bytes)
        .await
        .map_err(|e| failed(format!("cannot write {}: {}", path.display(), e)))?;

    info!("Downloaded {} ({} bytes) → {}", url, bytes.len(), path.display());
    Ok(path)
}

/// `remote_<timestamp>_<basename>`, with `.png` appended when the basename
/// has no extension.
pub fn remote_file_name(url: &str, timestamp: u64) -> String {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    let after_scheme = without_query
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(without_query);

    // The host alone (no path) is not a file name.
    let basename = match after_scheme.split_once('/') {
        Some((_, path)) => path.rsplit('/').next().unwrap_or(""),
        None => "",
    };

    let mut name = if basename.is_empty() || basename.len() > 255 {
        FALLBACK_BASENAME.to_string()
    } else {
        basename.to_string()
    };
    if Path::new(&name).extension().is_none() {
        name.push_str(".png");
    }
    format!("remote_{}_{}", timestamp, name)
}

/// Return `dir/name`, or `dir/<stem>_<n>.<ext>` if that file already exists.
fn unique_path(dir: &Path, name: &str) -> PathBuf {
    let candidate = dir.join(name);
    if !candidate.exists() {
        return candidate;
    }
    let stem = Path::new(name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(name);
    let ext = Path::new(name)
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("png");
    (1..)
        .map(|n| dir.join(format!("{stem}_{n}.{ext}")))
        .find(|p| !p.exists())
        .unwrap_or(candidate)
}

fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/a.png"));
        assert!(is_url("http://example.com/a.png"));
        assert!(!is_url("/tmp/a.png"));
        assert!(!is_url("images/a.png"));
        assert!(!is_url(""));
    }

    #[test]
    fn extract_dedups_in_first_appearance_order() {
        let md = "![a](x.png) text ![](y.png)\n![again](x.png) ![z](https://h/z.jpg)";
        assert_eq!(
            extract_image_targets(md),
            vec!["x.png", "y.png", "https://h/z.jpg"]
        );
    }

    #[test]
    fn extract_ignores_plain_links() {
        let md = "[not an image](doc.md) and ![img](pic.png)";
        assert_eq!(extract_image_targets(md), vec!["pic.png"]);
    }

    #[test]
    fn extract_is_deterministic() {
        let md = "![1](b.png)![2](a.png)![3](b.png)";
        assert_eq!(extract_image_targets(md), extract_image_targets(md));
    }

    #[tokio::test]
    async fn resolving_twice_yields_the_same_targets() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.png"), b"png").unwrap();
        std::fs::write(dir.path().join("c.png"), b"png").unwrap();
        let md = "![](c.png) ![](missing.png) ![](a.png) ![](c.png) ![](gone/b.png)";
        let scratch = dir.path().join("downloaded_images");
        let config = EnhanceConfig::default();

        let targets = |images: Vec<ImageReference>| {
            images
                .into_iter()
                .map(|i| i.raw_target)
                .collect::<std::collections::BTreeSet<_>>()
        };
        let first = targets(resolve_images(md, dir.path(), &scratch, &config).await);
        let second = targets(resolve_images(md, dir.path(), &scratch, &config).await);

        assert_eq!(first, second);
        assert_eq!(
            first.into_iter().collect::<Vec<_>>(),
            vec!["a.png".to_string(), "c.png".to_string()]
        );
    }

    #[test]
    fn remote_names() {
        assert_eq!(
            remote_file_name("https://cdn.example.com/img/tree.jpg?w=200", 42),
            "remote_42_tree.jpg"
        );
        assert_eq!(
            remote_file_name("https://cdn.example.com/render", 42),
            "remote_42_render.png"
        );
        assert_eq!(
            remote_file_name("https://cdn.example.com/", 7),
            "remote_7_downloaded_img.png"
        );
        assert_eq!(
            remote_file_name("https://cdn.example.com", 7),
            "remote_7_downloaded_img.png"
        );
    }

    #[test]
    fn unique_path_adds_suffix_on_collision() {
        let dir = tempfile::tempdir().unwrap();
        let first = unique_path(dir.path(), "remote_1_a.png");
        std::fs::write(&first, b"x").unwrap();
        let second = unique_path(dir.path(), "remote_1_a.png");
        assert_ne!(first, second);
        assert!(second.ends_with("remote_1_a_1.png"));
    }

    #[tokio::test]
    async fn local_missing_files_are_dropped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("img")).unwrap();
        std::fs::write(dir.path().join("img/ok.png"), b"png").unwrap();

        let md = "![](img/ok.png) ![](img/missing.png) ![](img)";
        let images = resolve_images(
            md,
            dir.path(),
            &dir.path().join("downloaded_images"),
            &EnhanceConfig::default(),
        )
        .await;

        assert_eq!(images.len(), 1);
        assert_eq!(images[0].raw_target, "img/ok.png");
        assert_eq!(images[0].resolved_location, dir.path().join("img/ok.png"));
        // No remote targets: the scratch dir is never created.
        assert!(!dir.path().join("downloaded_images").exists());
    }
}
