//! Strict text decoding of CSV fields.
//!
//! Fields are decoded one at a time from the raw bytes the CSV tokenizer
//! produces. Decoding never substitutes replacement characters: an invalid
//! sequence is an [`Error::Decode`], which is what the pipeline's encoding
//! fallback keys on.

use crate::error::{Error, Result};
use encoding_rs::{Encoding, UTF_8};
use std::borrow::Cow;

/// Byte order mark, as it appears after UTF-8 decoding.
const BOM: char = '\u{feff}';

/// Look up an encoding by its WHATWG label (`"utf-8"`, `"latin1"`, `"cp1252"`...).
///
/// # Errors
///
/// Returns [`Error::Config`] for an unknown label or an encoding the CSV
/// tokenizer cannot split, such as UTF-16.
pub fn resolve(label: &str) -> Result<&'static Encoding> {
    let encoding = Encoding::for_label(label.trim().as_bytes())
        .ok_or_else(|| Error::Config(format!("unknown text encoding {label:?}")))?;
    if !encoding.is_ascii_compatible() {
        return Err(Error::Config(format!(
            "encoding {} is not ASCII-compatible",
            encoding.name()
        )));
    }
    Ok(encoding)
}

/// Decode one field; `line` is reported on failure.
pub fn decode_field<'a>(
    bytes: &'a [u8],
    encoding: &'static Encoding,
    line: u64,
) -> Result<Cow<'a, str>> {
    let failed = || Error::Decode {
        encoding: encoding.name(),
        line,
    };
    if encoding == UTF_8 {
        return std::str::from_utf8(bytes).map(Cow::Borrowed).map_err(|_| failed());
    }
    encoding
        .decode_without_bom_handling_and_without_replacement(bytes)
        .ok_or_else(failed)
}

/// Remove a leading byte order mark from the first header cell.
pub fn strip_bom(field: Cow<'_, str>) -> Cow<'_, str> {
    match field {
        Cow::Borrowed(s) => Cow::Borrowed(s.strip_prefix(BOM).unwrap_or(s)),
        Cow::Owned(s) => match s.strip_prefix(BOM) {
            Some(rest) => Cow::Owned(rest.to_string()),
            None => Cow::Owned(s),
        },
    }
}
