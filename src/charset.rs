//! Entry name transcoding.
//!
//! ZIP entry names are plain byte strings. Archives produced by DOS-era or
//! locale-bound tools store them in whatever code page the producer ran
//! under, and nothing in the container says which one. This module guesses
//! the encoding of a single name and decodes it to UTF-8.
//!
//! ## Detection Order
//!
//! 1. A byte-order mark names the encoding outright.
//! 2. Pure ASCII and valid UTF-8 are taken as UTF-8.
//! 3. Anything else is uncertain. [`chardetng`] still looks at it as a
//!    tiny plain-text document, but on a dozen bytes its guess is noise,
//!    so it is only reported in the debug log.
//!
//! Uncertain names are decoded with a fixed fallback code page,
//! [`FALLBACK_ENCODING`] unless overridden.

use encoding_rs::{Encoding, IBM866, UTF_8};
use thiserror::Error;
use tracing::debug;

use chardetng::EncodingDetector;

/// Code page applied when detection is not certain.
///
/// IBM866 is the DOS Cyrillic code page, which is what archivers running
/// on Russian-locale Windows write into the name field.
pub const FALLBACK_ENCODING: &Encoding = IBM866;

/// Errors produced while decoding an entry name.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TranscodeError {
    /// The name bytes are not a valid sequence in the selected encoding.
    #[error("entry name is not valid {encoding}")]
    Malformed { encoding: &'static str },
}

/// Outcome of encoding detection for one name.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detected {
    pub encoding: &'static Encoding,
    pub certain: bool,
    /// Length of a leading byte-order mark, if detection came from one.
    pub bom_len: usize,
}

/// Detects and decodes entry names.
#[derive(Debug, Clone, Copy)]
pub struct NameTranscoder {
    fallback: &'static Encoding,
}

impl Default for NameTranscoder {
    fn default() -> Self {
        Self {
            fallback: FALLBACK_ENCODING,
        }
    }
}

impl NameTranscoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different code page for names that detection is unsure about.
    pub fn with_fallback(fallback: &'static Encoding) -> Self {
        Self { fallback }
    }

    pub fn fallback(&self) -> &'static Encoding {
        self.fallback
    }

    /// Guess the encoding of a raw name.
    pub fn detect(&self, raw: &[u8]) -> Detected {
        if let Some((encoding, bom_len)) = Encoding::for_bom(raw) {
            return Detected {
                encoding,
                certain: true,
                bom_len,
            };
        }

        // Covers pure ASCII too, which decodes the same under every candidate.
        if std::str::from_utf8(raw).is_ok() {
            return Detected {
                encoding: UTF_8,
                certain: true,
                bom_len: 0,
            };
        }

        let mut detector = EncodingDetector::new();
        detector.feed(raw, true);

        Detected {
            encoding: detector.guess(None, false),
            certain: false,
            bom_len: 0,
        }
    }

    /// Pick the encoding to decode with: the detected one if certain,
    /// otherwise the fallback.
    pub fn select(&self, detected: &Detected) -> &'static Encoding {
        if detected.certain {
            detected.encoding
        } else {
            self.fallback
        }
    }

    /// Transcode a raw entry name to UTF-8.
    ///
    /// # Errors
    ///
    /// Returns [`TranscodeError::Malformed`] if the bytes cannot be decoded
    /// by the selected encoding. No replacement characters are ever
    /// substituted.
    pub fn transcode(&self, raw: &[u8]) -> Result<String, TranscodeError> {
        let detected = self.detect(raw);
        let encoding = self.select(&detected);

        debug!(
            guess = detected.encoding.name(),
            certain = detected.certain,
            selected = encoding.name(),
            "detected name encoding"
        );

        let body = if detected.certain {
            &raw[detected.bom_len..]
        } else {
            raw
        };
        decode(body, encoding)
    }
}

/// Transcode a raw entry name with the default fallback.
pub fn transcode(raw: &[u8]) -> Result<String, TranscodeError> {
    NameTranscoder::default().transcode(raw)
}

/// Strictly decode `raw` with `encoding`.
pub fn decode(raw: &[u8], encoding: &'static Encoding) -> Result<String, TranscodeError> {
    encoding
        .decode_without_bom_handling_and_without_replacement(raw)
        .map(|text| text.into_owned())
        .ok_or(TranscodeError::Malformed {
            encoding: encoding.name(),
        })
}
