//! Barcode formats and decode hints.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Symbologies the decode collaborator can be asked to look for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BarcodeFormat {
    Aztec,
    Codabar,
    #[serde(rename = "CODE_39")]
    Code39,
    #[serde(rename = "CODE_93")]
    Code93,
    #[serde(rename = "CODE_128")]
    Code128,
    DataMatrix,
    #[serde(rename = "EAN_8")]
    Ean8,
    #[serde(rename = "EAN_13")]
    Ean13,
    Itf,
    Maxicode,
    #[serde(rename = "PDF_417")]
    Pdf417,
    QrCode,
    #[serde(rename = "RSS_14")]
    Rss14,
    RssExpanded,
    UpcA,
    UpcE,
    UpcEanExtension,
}

impl BarcodeFormat {
    pub const ALL: [BarcodeFormat; 17] = [
        BarcodeFormat::Aztec,
        BarcodeFormat::Codabar,
        BarcodeFormat::Code39,
        BarcodeFormat::Code93,
        BarcodeFormat::Code128,
        BarcodeFormat::DataMatrix,
        BarcodeFormat::Ean8,
        BarcodeFormat::Ean13,
        BarcodeFormat::Itf,
        BarcodeFormat::Maxicode,
        BarcodeFormat::Pdf417,
        BarcodeFormat::QrCode,
        BarcodeFormat::Rss14,
        BarcodeFormat::RssExpanded,
        BarcodeFormat::UpcA,
        BarcodeFormat::UpcE,
        BarcodeFormat::UpcEanExtension,
    ];

    /// Canonical upper-case name, e.g. `QR_CODE`.
    pub fn name(self) -> &'static str {
        match self {
            BarcodeFormat::Aztec => "AZTEC",
            BarcodeFormat::Codabar => "CODABAR",
            BarcodeFormat::Code39 => "CODE_39",
            BarcodeFormat::Code93 => "CODE_93",
            BarcodeFormat::Code128 => "CODE_128",
            BarcodeFormat::DataMatrix => "DATA_MATRIX",
            BarcodeFormat::Ean8 => "EAN_8",
            BarcodeFormat::Ean13 => "EAN_13",
            BarcodeFormat::Itf => "ITF",
            BarcodeFormat::Maxicode => "MAXICODE",
            BarcodeFormat::Pdf417 => "PDF_417",
            BarcodeFormat::QrCode => "QR_CODE",
            BarcodeFormat::Rss14 => "RSS_14",
            BarcodeFormat::RssExpanded => "RSS_EXPANDED",
            BarcodeFormat::UpcA => "UPC_A",
            BarcodeFormat::UpcE => "UPC_E",
            BarcodeFormat::UpcEanExtension => "UPC_EAN_EXTENSION",
        }
    }
}

impl fmt::Display for BarcodeFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A format specifier that names no known symbology.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("unknown barcode format: {0:?}")]
    Unknown(String),
    #[error("no barcode formats given")]
    Empty,
}

impl FromStr for BarcodeFormat {
    type Err = FormatError;

    /// Parses a format name, ignoring case and surrounding whitespace.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_uppercase();
        BarcodeFormat::ALL
            .into_iter()
            .find(|f| f.name() == wanted)
            .ok_or_else(|| FormatError::Unknown(s.to_string()))
    }
}

/// Parses a list of format names, failing on the first malformed one.
pub fn parse_formats<S: AsRef<str>>(names: &[S]) -> Result<Vec<BarcodeFormat>, FormatError> {
    if names.is_empty() {
        return Err(FormatError::Empty);
    }
    let mut formats = Vec::with_capacity(names.len());
    for name in names {
        let format: BarcodeFormat = name.as_ref().parse()?;
        if !formats.contains(&format) {
            formats.push(format);
        }
    }
    Ok(formats)
}

/// Hints passed to the decode collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodeHints {
    /// Restrict decoding to these symbologies.
    pub possible_formats: Vec<BarcodeFormat>,
    /// Spend more time per frame for better recall.
    pub try_harder: bool,
}

impl Default for DecodeHints {
    fn default() -> Self {
        Self {
            possible_formats: vec![BarcodeFormat::QrCode],
            try_harder: false,
        }
    }
}

impl DecodeHints {
    pub fn accepts(&self, format: BarcodeFormat) -> bool {
        self.possible_formats.contains(&format)
    }
}
