use std::path::{Path, PathBuf};

use serde::Serialize;
use textflow_core::{Metadata, TextUnit};

use crate::BoxFuture;

/// Default maximum file size: 50 MiB.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum LoaderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("file too large: {size} bytes (max {max})")]
    FileTooLarge { size: u64, max: u64 },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadedDocument {
    pub units: Vec<TextUnit>,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub ok: bool,
    pub errors: Vec<String>,
    pub detected_format: Option<String>,
}

/// Format-specific source reader. The engine uses it for `load` stages.
pub trait DocumentLoader: Send + Sync {
    fn name(&self) -> &str;

    fn load(&self, source: &str) -> BoxFuture<'_, Result<LoadedDocument, LoaderError>>;

    fn validate(&self, source: &str) -> BoxFuture<'_, ValidationReport>;

    fn detect_format(&self, source: &str) -> Option<String>;
}

/// Plain text, Markdown and CSV files, read whole into one unit.
pub struct TextLoader {
    pub max_file_size: u64,
}

impl Default for TextLoader {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

impl TextLoader {
    #[must_use]
    pub fn new(max_file_size: u64) -> Self {
        Self { max_file_size }
    }

    fn format_of(path: &Path) -> Option<&'static str> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "txt" | "text" | "log" => Some("text"),
            "md" | "markdown" => Some("markdown"),
            "csv" => Some("csv"),
            _ => None,
        }
    }

    fn content_type(format: &str) -> &'static str {
        match format {
            "markdown" => "text/markdown",
            "csv" => "text/csv",
            _ => "text/plain",
        }
    }
}

impl DocumentLoader for TextLoader {
    fn name(&self) -> &'static str {
        "text"
    }

    fn load(&self, source: &str) -> BoxFuture<'_, Result<LoadedDocument, LoaderError>> {
        let path = PathBuf::from(source);
        let max_size = self.max_file_size;
        Box::pin(async move {
            let format = Self::format_of(&path)
                .ok_or_else(|| LoaderError::UnsupportedFormat(path.display().to_string()))?;
            let path = tokio::fs::canonicalize(&path).await?;

            let meta = tokio::fs::metadata(&path).await?;
            if meta.len() > max_size {
                return Err(LoaderError::FileTooLarge {
                    size: meta.len(),
                    max: max_size,
                });
            }

            let content = tokio::fs::read_to_string(&path).await?;
            let source = path.display().to_string();
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();

            let unit = TextUnit::new(content)
                .with_metadata("source", source.as_str())
                .with_metadata("file_name", file_name)
                .with_metadata("format", format)
                .with_metadata("content_type", Self::content_type(format))
                .with_metadata("size_bytes", i64::try_from(meta.len()).unwrap_or(i64::MAX));

            let mut metadata = Metadata::new();
            metadata.insert("source".into(), source.into());
            metadata.insert("format".into(), format.into());
            tracing::debug!(source = %path.display(), bytes = meta.len(), "loaded document");

            Ok(LoadedDocument {
                units: vec![unit],
                metadata,
            })
        })
    }

    fn validate(&self, source: &str) -> BoxFuture<'_, ValidationReport> {
        let path = PathBuf::from(source);
        let max_size = self.max_file_size;
        Box::pin(async move {
            let detected_format = Self::format_of(&path).map(str::to_owned);
            let mut errors = Vec::new();
            if detected_format.is_none() {
                errors.push(format!("unsupported format: {}", path.display()));
            }
            match tokio::fs::metadata(&path).await {
                Ok(meta) if !meta.is_file() => errors.push(format!("not a file: {}", path.display())),
                Ok(meta) if meta.len() > max_size => {
                    errors.push(format!("file too large: {} bytes (max {max_size})", meta.len()));
                }
                Ok(_) => {}
                Err(e) => errors.push(format!("{}: {e}", path.display())),
            }
            ValidationReport {
                ok: errors.is_empty(),
                errors,
                detected_format,
            }
        })
    }

    fn detect_format(&self, source: &str) -> Option<String> {
        Self::format_of(Path::new(source)).map(str::to_owned)
    }
}
