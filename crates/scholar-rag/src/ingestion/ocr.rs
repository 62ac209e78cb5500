//! OCR of scanned PDF pages via `pdftoppm` + `tesseract`
//!
//! Both tools are invoked as external commands. Each page is rendered and
//! recognised independently so that one unreadable page does not sink the
//! rest of the document.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use crate::config::OcrConfig;
use crate::error::{Error, Result};

/// Page-level OCR over external tools
#[derive(Debug, Clone)]
pub struct OcrEngine {
    config: OcrConfig,
}

impl OcrEngine {
    /// Create a new OCR engine
    pub fn new(config: OcrConfig) -> Self {
        Self { config }
    }

    /// Whether OCR is switched on
    pub fn enabled(&self) -> bool {
        self.config.enabled
    }

    /// Check that both binaries can be launched
    pub async fn is_available(&self) -> bool {
        if !self.config.enabled {
            return false;
        }
        let tesseract = responds(&self.config.tesseract_cmd, "--version").await;
        let pdftoppm = responds(&self.config.pdftoppm_cmd, "-v").await;
        if !tesseract {
            tracing::warn!("OCR unavailable: '{}' could not be started", self.config.tesseract_cmd);
        }
        if !pdftoppm {
            tracing::warn!("OCR unavailable: '{}' could not be started", self.config.pdftoppm_cmd);
        }
        tesseract && pdftoppm
    }

    /// OCR the given 1-based pages; every page gets its own result
    pub async fn recognize_pages(&self, pdf: &[u8], pages: &[u32]) -> Vec<(u32, Result<String>)> {
        let workdir = match tempfile::Builder::new().prefix("scholar-rag-ocr-").tempdir() {
            Ok(dir) => dir,
            Err(e) => {
                let msg = format!("Failed to create OCR work dir: {}", e);
                return pages.iter().map(|p| (*p, Err(Error::internal(msg.clone())))).collect();
            }
        };

        let pdf_path = workdir.path().join("input.pdf");
        if let Err(e) = tokio::fs::write(&pdf_path, pdf).await {
            let msg = format!("Failed to stage PDF for OCR: {}", e);
            return pages.iter().map(|p| (*p, Err(Error::internal(msg.clone())))).collect();
        }

        let mut results = Vec::with_capacity(pages.len());
        for &page in pages {
            let result = self.recognize_page(&pdf_path, workdir.path(), page).await;
            match &result {
                Ok(text) => tracing::debug!("OCR page {}: {} chars", page, text.chars().count()),
                Err(e) => tracing::warn!("OCR failed on page {}: {}", page, e),
            }
            results.push((page, result));
        }
        results
    }

    async fn recognize_page(&self, pdf_path: &Path, workdir: &Path, page: u32) -> Result<String> {
        let prefix = workdir.join(format!("page-{}", page));
        let page_arg = page.to_string();
        let dpi = self.config.dpi.to_string();

        let mut render = Command::new(&self.config.pdftoppm_cmd);
        render
            .arg("-png")
            .args(["-r", &dpi])
            .args(["-f", &page_arg, "-l", &page_arg])
            .arg(pdf_path)
            .arg(&prefix);
        let output = self.run(render, "pdftoppm").await?;
        if !output.status.success() {
            return Err(Error::internal(format!(
                "pdftoppm exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let image = find_rendered_image(workdir, &format!("page-{}", page))
            .await?
            .ok_or_else(|| Error::internal("pdftoppm produced no image"))?;

        let mut recognise = Command::new(&self.config.tesseract_cmd);
        recognise
            .arg(&image)
            .arg("stdout")
            .args(["-l", &self.config.language]);
        let output = self.run(recognise, "tesseract").await?;
        if !output.status.success() {
            return Err(Error::internal(format!(
                "tesseract exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if text.is_empty() {
            return Err(Error::internal("OCR produced no text"));
        }
        Ok(text)
    }

    async fn run(&self, mut command: Command, name: &str) -> Result<std::process::Output> {
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = command
            .spawn()
            .map_err(|e| Error::internal(format!("Failed to start {}: {}", name, e)))?;

        let timeout = Duration::from_secs(self.config.timeout_secs);
        match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(output) => output.map_err(|e| Error::internal(format!("{} failed: {}", name, e))),
            Err(_) => Err(Error::internal(format!("{} timed out after {:?}", name, timeout))),
        }
    }
}

async fn responds(cmd: &str, flag: &str) -> bool {
    Command::new(cmd)
        .arg(flag)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .is_ok()
}

/// pdftoppm zero-pads the page suffix depending on the page count
async fn find_rendered_image(dir: &Path, stem: &str) -> Result<Option<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut found = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let matches = path.extension().is_some_and(|ext| ext == "png")
            && path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(&format!("{}-", stem)));
        if matches {
            found.push(path);
        }
    }
    found.sort();
    Ok(found.into_iter().next())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_binaries_fail_per_page() {
        let engine = OcrEngine::new(OcrConfig {
            pdftoppm_cmd: "definitely-not-a-real-pdftoppm".to_string(),
            tesseract_cmd: "definitely-not-a-real-tesseract".to_string(),
            ..OcrConfig::default()
        });
        assert!(!engine.is_available().await);

        let results = engine.recognize_pages(b"%PDF-1.4", &[1, 3]).await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, 1);
        assert_eq!(results[1].0, 3);
        assert!(results.iter().all(|(_, r)| r.is_err()));
    }

    #[tokio::test]
    async fn test_disabled_engine_reports_unavailable() {
        let engine = OcrEngine::new(OcrConfig {
            enabled: false,
            ..OcrConfig::default()
        });
        assert!(!engine.enabled());
        assert!(!engine.is_available().await);
    }
}
