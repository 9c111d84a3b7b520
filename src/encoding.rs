//! Text encoding detection and decoding for plain-text books.
//!
//! Detection is a fixed, ordered list of checks over a prefix of the file:
//! byte-order marks first, then the GBK and Big5 byte-range scanners, then
//! UTF-8 validity. The first check that matches wins.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of leading bytes inspected by [`detect_prefix`].
pub const DETECTION_PREFIX_LEN: usize = 4096;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];
const UTF16BE_BOM: &[u8] = &[0xFE, 0xFF];
const UTF16LE_BOM: &[u8] = &[0xFF, 0xFE];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Encoding {
    #[default]
    Utf8,
    Utf16Be,
    Utf16Le,
    Gbk,
    Big5,
    Latin1,
}

impl Encoding {
    pub const ALL: [Encoding; 6] = [
        Encoding::Utf8,
        Encoding::Utf16Be,
        Encoding::Utf16Le,
        Encoding::Gbk,
        Encoding::Big5,
        Encoding::Latin1,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Encoding::Utf8 => "utf-8",
            Encoding::Utf16Be => "utf-16be",
            Encoding::Utf16Le => "utf-16le",
            Encoding::Gbk => "gbk",
            Encoding::Big5 => "big5",
            Encoding::Latin1 => "latin1",
        }
    }

    fn codec(self) -> &'static encoding_rs::Encoding {
        match self {
            Encoding::Utf8 => encoding_rs::UTF_8,
            Encoding::Utf16Be => encoding_rs::UTF_16BE,
            Encoding::Utf16Le => encoding_rs::UTF_16LE,
            Encoding::Gbk => encoding_rs::GBK,
            Encoding::Big5 => encoding_rs::BIG5,
            // encoding_rs (like browsers) maps ISO-8859-1 onto windows-1252.
            Encoding::Latin1 => encoding_rs::WINDOWS_1252,
        }
    }

    fn bom(self) -> Option<&'static [u8]> {
        match self {
            Encoding::Utf8 => Some(UTF8_BOM),
            Encoding::Utf16Be => Some(UTF16BE_BOM),
            Encoding::Utf16Le => Some(UTF16LE_BOM),
            _ => None,
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Encoding {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" | "" => Ok(Encoding::Utf8),
            "utf-16be" | "utf16be" => Ok(Encoding::Utf16Be),
            "utf-16le" | "utf16le" => Ok(Encoding::Utf16Le),
            "gbk" | "gb2312" => Ok(Encoding::Gbk),
            "big5" => Ok(Encoding::Big5),
            "latin1" | "iso-8859-1" => Ok(Encoding::Latin1),
            _ => Err(DecodeError::UnsupportedEncoding(s.to_string())),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// The encoding label is not one the decoder knows.
    #[error("unsupported encoding: {0}")]
    UnsupportedEncoding(String),

    /// The bytes are not a valid sequence in the requested encoding.
    #[error("malformed {encoding} byte sequence")]
    Malformed { encoding: Encoding },
}

/// Classify `data`. The order of the checks matters on ambiguous input.
pub fn detect(data: &[u8]) -> Encoding {
    if data.starts_with(UTF8_BOM) {
        return Encoding::Utf8;
    }
    if data.starts_with(UTF16BE_BOM) {
        return Encoding::Utf16Be;
    }
    if data.starts_with(UTF16LE_BOM) {
        return Encoding::Utf16Le;
    }
    if is_gbk(data) {
        return Encoding::Gbk;
    }
    if is_big5(data) {
        return Encoding::Big5;
    }
    if std::str::from_utf8(data).is_ok() {
        return Encoding::Utf8;
    }
    Encoding::Utf8
}

/// Run [`detect`] over the first [`DETECTION_PREFIX_LEN`] bytes of a file.
pub fn detect_prefix(data: &[u8]) -> Encoding {
    detect(&data[..data.len().min(DETECTION_PREFIX_LEN)])
}

/// Like [`detect_prefix`], but when the strict checks only reached the UTF-8
/// fallback (the prefix is not valid UTF-8), give GBK a second chance with
/// the ratio-based [`is_common_chinese`] scan.
pub fn detect_lenient(data: &[u8]) -> Encoding {
    let prefix = &data[..data.len().min(DETECTION_PREFIX_LEN)];
    let strict = detect(prefix);
    if strict == Encoding::Utf8
        && !prefix.starts_with(UTF8_BOM)
        // A prefix cut inside a multi-byte character is still UTF-8.
        && matches!(std::str::from_utf8(prefix), Err(err) if err.error_len().is_some())
        && is_common_chinese(prefix)
    {
        return Encoding::Gbk;
    }
    strict
}

/// All-or-nothing GBK scan: one invalid or truncated pair rejects the buffer.
pub fn is_gbk(data: &[u8]) -> bool {
    let mut i = 0;
    while i < data.len() {
        let lead = data[i];
        if lead <= 0x7F {
            i += 1;
            continue;
        }
        match data.get(i + 1) {
            Some(&trail)
                if (0x81..=0xFE).contains(&lead)
                    && (0x40..=0xFE).contains(&trail)
                    && trail != 0x7F =>
            {
                i += 2;
            }
            _ => return false,
        }
    }
    true
}

/// All-or-nothing Big5 scan. Lead bytes run up to 0xFE; the stricter 0xF9
/// bound some readers use would reject the extension rows.
pub fn is_big5(data: &[u8]) -> bool {
    let mut i = 0;
    while i < data.len() {
        let lead = data[i];
        if lead <= 0x7F {
            i += 1;
            continue;
        }
        match data.get(i + 1) {
            Some(&trail)
                if (0xA1..=0xFE).contains(&lead)
                    && ((0x40..=0x7E).contains(&trail) || (0xA1..=0xFE).contains(&trail)) =>
            {
                i += 2;
            }
            _ => return false,
        }
    }
    true
}

/// Ratio-based GBK guess: true when GBK-shaped pairs make up more than a
/// tenth of the scanned units. Stray bytes are skipped rather than rejected.
pub fn is_common_chinese(data: &[u8]) -> bool {
    if data.len() < 2 {
        return false;
    }

    let mut chinese_pairs = 0usize;
    let mut total = 0usize;
    let mut i = 0;
    while i + 1 < data.len() {
        let byte = data[i];
        if byte <= 0x7F {
            total += 1;
        } else if (0x81..=0xFE).contains(&byte) && (0x40..=0xFE).contains(&data[i + 1]) {
            chinese_pairs += 1;
            total += 2;
            i += 1;
        }
        i += 1;
    }

    total > 0 && chinese_pairs as f64 / total as f64 > 0.1
}

/// Strictly transcode `data` from `encoding` and split it into lines.
pub fn decode(data: &[u8], encoding: Encoding) -> Result<Vec<String>, DecodeError> {
    let body = match encoding.bom() {
        Some(bom) => data.strip_prefix(bom).unwrap_or(data),
        None => data,
    };
    let text = encoding
        .codec()
        .decode_without_bom_handling_and_without_replacement(body)
        .ok_or(DecodeError::Malformed { encoding })?;
    Ok(split_lines(&text))
}

/// [`decode`] with the encoding given as a label such as `"gbk"`.
pub fn decode_label(data: &[u8], label: &str) -> Result<Vec<String>, DecodeError> {
    decode(data, label.parse()?)
}

/// Split on `\n`, dropping one trailing `\r` per line. Line length is
/// unbounded.
pub fn split_lines(text: &str) -> Vec<String> {
    text.split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line).to_string())
        .collect()
}
