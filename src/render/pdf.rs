//! HTML to PDF rasterization.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tempfile::tempdir;

use super::RenderError;
use crate::template::model::Margins;

pub const DEFAULT_DPI: u32 = 300;

/// Turns a complete HTML page into PDF bytes. Implementations block.
pub trait PdfRasterizer: Send + Sync {
    fn rasterize(&self, html: &str, margins: Margins) -> Result<Vec<u8>, RenderError>;
}

/// Rasterizer backed by the `wkhtmltopdf` CLI. Always A4 portrait.
pub struct WkhtmltopdfRasterizer {
    binary: PathBuf,
    dpi: u32,
}

impl WkhtmltopdfRasterizer {
    pub fn new(binary: impl Into<PathBuf>, dpi: u32) -> Self {
        Self {
            binary: binary.into(),
            dpi,
        }
    }

    fn arguments(&self, margins: Margins, input: &Path, output: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "--quiet".into(),
            "--dpi".into(),
            self.dpi.to_string().into(),
            "--page-size".into(),
            "A4".into(),
            "--orientation".into(),
            "Portrait".into(),
        ];
        for (flag, value) in [
            ("--margin-top", margins.top),
            ("--margin-bottom", margins.bottom),
            ("--margin-left", margins.left),
            ("--margin-right", margins.right),
        ] {
            args.push(flag.into());
            args.push(format!("{}mm", value).into());
        }
        args.push(input.as_os_str().to_owned());
        args.push(output.as_os_str().to_owned());
        args
    }
}

impl Default for WkhtmltopdfRasterizer {
    fn default() -> Self {
        Self::new("wkhtmltopdf", DEFAULT_DPI)
    }
}

impl PdfRasterizer for WkhtmltopdfRasterizer {
    fn rasterize(&self, html: &str, margins: Margins) -> Result<Vec<u8>, RenderError> {
        let temp_dir = tempdir().map_err(RenderError::TempDir)?;
        let input = temp_dir.path().join("document.html");
        let output = temp_dir.path().join("document.pdf");

        fs::write(&input, html).map_err(RenderError::WriteHtml)?;

        log::debug!(
            "Running {} at {} dpi with margins {:?}",
            self.binary.display(),
            self.dpi,
            margins
        );
        let status = Command::new(&self.binary)
            .args(self.arguments(margins, &input, &output))
            .current_dir(temp_dir.path())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .status()
            .map_err(RenderError::RasterizerIo)?;

        if !status.success() {
            let code = status.code().unwrap_or(-1);
            return Err(RenderError::RasterizerExit(code));
        }

        let pdf = fs::read(&output).map_err(RenderError::ReadPdf)?;
        if pdf.is_empty() {
            return Err(RenderError::EmptyPdf);
        }
        Ok(pdf)
    }
}
