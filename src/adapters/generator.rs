//! Built-in generator that performs no rasterization.
//!
//! Emits the source image unchanged as the favicon plus a web app manifest.
//! Resizing into per-platform icon sets belongs to a real image backend
//! plugged in through `IconGenerator`.

use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::json;

use super::{GenerateRequest, GeneratedFile, GeneratedIcons, IconGenerator};

/// Copies the logo through as `favicon.<ext>`
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughGenerator;

impl PassthroughGenerator {
    pub fn new() -> Self {
        Self
    }
}

fn mime_type(extension: &str) -> &'static str {
    match extension {
        "png" => "image/png",
        "ico" => "image/x-icon",
        "svg" => "image/svg+xml",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}

#[async_trait]
impl IconGenerator for PassthroughGenerator {
    fn name(&self) -> &str {
        "passthrough"
    }

    async fn generate(&self, source: &[u8], request: &GenerateRequest) -> Result<GeneratedIcons> {
        let extension = Path::new(&request.source_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_else(|| "png".to_string());
        let mime = mime_type(&extension);
        let favicon = format!("favicon.{}", extension);

        let manifest = json!({
            "name": request.app_name,
            "background_color": request.background,
            "platforms": request.icons.enabled(),
            "icons": [{ "src": favicon, "type": mime }],
        });
        let manifest =
            serde_json::to_vec_pretty(&manifest).context("Failed to serialize web app manifest")?;

        let mut html = vec![format!(
            r#"<link rel="icon" type="{}" href="{}">"#,
            mime, favicon
        )];
        if request.icons.apple_icon {
            html.push(format!(r#"<link rel="apple-touch-icon" href="{}">"#, favicon));
        }
        html.push(r#"<link rel="manifest" href="manifest.json">"#.to_string());

        Ok(GeneratedIcons {
            images: vec![GeneratedFile::new(favicon, source.to_vec())],
            files: vec![GeneratedFile::new("manifest.json", manifest)],
            html,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::IconPlatforms;

    fn request(source_name: &str) -> GenerateRequest {
        GenerateRequest {
            source_name: source_name.to_string(),
            app_name: Some("Demo".to_string()),
            background: Some("#336699".to_string()),
            icons: IconPlatforms::default(),
        }
    }

    #[tokio::test]
    async fn test_copies_source_as_favicon() {
        let icons = PassthroughGenerator::new()
            .generate(b"\x89PNG", &request("logo.PNG"))
            .await
            .unwrap();

        assert_eq!(icons.images, vec![GeneratedFile::new("favicon.png", b"\x89PNG".to_vec())]);
        assert_eq!(icons.files[0].name, "manifest.json");
        assert_eq!(icons.html.len(), 3);
        assert!(icons.html[0].contains(r#"type="image/png""#));
    }

    #[tokio::test]
    async fn test_manifest_describes_request() {
        let icons = PassthroughGenerator::new()
            .generate(b"<svg/>", &request("logo.svg"))
            .await
            .unwrap();

        let manifest: serde_json::Value = serde_json::from_slice(&icons.files[0].contents).unwrap();
        assert_eq!(manifest["name"], "Demo");
        assert_eq!(manifest["background_color"], "#336699");
        assert_eq!(manifest["icons"][0]["type"], "image/svg+xml");
        assert_eq!(manifest["platforms"].as_array().unwrap().len(), 10);
    }

    #[tokio::test]
    async fn test_apple_icon_toggle() {
        let mut req = request("logo.png");
        req.icons.apple_icon = false;

        let icons = PassthroughGenerator::new().generate(b"png", &req).await.unwrap();
        assert!(!icons.html.iter().any(|tag| tag.contains("apple-touch-icon")));
    }
}
