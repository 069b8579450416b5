use std::collections::VecDeque;
use std::process::Command;

use anyhow::{anyhow, Context, Result};
use image::{GrayImage, ImageFormat};

/// Default executable name for the Tesseract CLI.
pub const DEFAULT_TESSERACT_COMMAND: &str = "tesseract";

/// Optical character recognition over a preprocessed binary image.
pub trait TextRecognizer: Send {
    /// Recognizer identifier.
    fn name(&self) -> &'static str;

    /// Return whatever text the engine reads. Garbage is a valid answer.
    fn recognize(&mut self, image: &GrayImage) -> Result<String>;
}

/// Recognizer backed by the `tesseract` command line tool.
///
/// The binary image is written to a temporary PNG and the tool prints its text
/// to stdout. The temporary file is removed when the call returns.
#[derive(Clone, Debug)]
pub struct TesseractCli {
    command: String,
}

impl TesseractCli {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

impl Default for TesseractCli {
    fn default() -> Self {
        Self::new(DEFAULT_TESSERACT_COMMAND)
    }
}

impl TextRecognizer for TesseractCli {
    fn name(&self) -> &'static str {
        "tesseract"
    }

    fn recognize(&mut self, image: &GrayImage) -> Result<String> {
        if image.width() == 0 || image.height() == 0 {
            return Ok(String::new());
        }
        let file = tempfile::Builder::new()
            .prefix("gps-strip-")
            .suffix(".png")
            .tempfile()
            .context("create OCR scratch file")?;
        image
            .save_with_format(file.path(), ImageFormat::Png)
            .context("write OCR scratch image")?;

        let output = Command::new(&self.command)
            .arg(file.path())
            .arg("stdout")
            .output()
            .with_context(|| format!("failed to launch '{}'", self.command))?;

        if !output.status.success() {
            return Err(anyhow!(
                "'{}' exited with {}: {}",
                self.command,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Recognizer for tests and dry runs: returns scripted text in call order.
///
/// `None` entries simulate an engine failure. An exhausted script reads as
/// empty text.
#[derive(Clone, Debug, Default)]
pub struct ScriptedRecognizer {
    script: VecDeque<Option<String>>,
    calls: u64,
}

impl ScriptedRecognizer {
    pub fn new(script: Vec<Option<String>>) -> Self {
        Self {
            script: script.into(),
            calls: 0,
        }
    }

    /// Script where every call succeeds with the given text.
    pub fn from_texts<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(texts.into_iter().map(|t| Some(t.into())).collect())
    }

    pub fn calls(&self) -> u64 {
        self.calls
    }
}

impl TextRecognizer for ScriptedRecognizer {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn recognize(&mut self, _image: &GrayImage) -> Result<String> {
        self.calls += 1;
        match self.script.pop_front() {
            Some(Some(text)) => Ok(text),
            Some(None) => Err(anyhow!("scripted OCR failure")),
            None => Ok(String::new()),
        }
    }
}
