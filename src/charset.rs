//! Character encoding of project files and the descriptor.
//!
//! A project declares one encoding (default `ISO-8859-1`). Every text file the
//! loader reads is decoded from it, and the finished descriptor is encoded
//! back into it, so the bytes on disk match the encoding named in the XML
//! header. `config.toml` itself is always UTF-8.
//!
//! Labels are resolved with the WHATWG rules of `encoding_rs`: `ISO-8859-1`
//! and `latin1` map to `windows-1252`, which decodes and re-encodes every
//! byte unchanged.

use std::{fs, path::Path};

use encoding_rs::Encoding;
use tracing::warn;

use crate::error::{Error, Result};

/// Resolve an encoding label such as `ISO-8859-1` or `UTF-8`.
///
/// # Arguments
///
/// * `label` - The encoding name as written in the project config
///
/// # Returns
///
/// The matching [`Encoding`].
///
/// # Errors
///
/// Returns [`Error::UnsupportedEncoding`] if the label is unknown, or names an
/// encoding that cannot be written back (UTF-16 and the replacement
/// encoding).
///
/// # Examples
///
/// ```
/// # use vde_builder::charset::for_label;
/// let latin1 = for_label("ISO-8859-1")?;
/// assert_eq!(latin1.name(), "windows-1252");
/// # Ok::<(), vde_builder::Error>(())
/// ```
pub fn for_label(label: &str) -> Result<&'static Encoding> {
    Encoding::for_label(label.trim().as_bytes())
        .filter(|encoding| encoding.output_encoding() == *encoding)
        .ok_or_else(|| Error::UnsupportedEncoding {
            label: label.to_string(),
        })
}

/// Read the file at `path` and decode it from `encoding`.
///
/// No byte order mark handling is done; the content is taken as is.
///
/// # Arguments
///
/// * `path` - The file to read
/// * `encoding` - The project encoding
///
/// # Errors
///
/// - [`Error::Io`] if the file cannot be read
/// - [`Error::Decode`] if the bytes are malformed for `encoding`
pub fn read_text(path: &Path, encoding: &'static Encoding) -> Result<String> {
    let bytes = fs::read(path).map_err(|e| Error::io(path, e))?;

    encoding
        .decode_without_bom_handling_and_without_replacement(&bytes)
        .map(std::borrow::Cow::into_owned)
        .ok_or_else(|| Error::Decode {
            path: path.to_path_buf(),
            encoding: encoding.name(),
        })
}

/// Encode `text` into `encoding`.
///
/// Characters the encoding cannot represent are written as decimal
/// character references (`&#19990;`).
///
/// # Arguments
///
/// * `text` - The text to encode
/// * `encoding` - The project encoding
///
/// # Returns
///
/// The encoded bytes.
#[must_use]
pub fn encode(text: &str, encoding: &'static Encoding) -> Vec<u8> {
    let (bytes, _, unmappable) = encoding.encode(text);

    if unmappable {
        warn!(
            encoding = encoding.name(),
            "characters without a mapping were written as character references"
        );
    }

    bytes.into_owned()
}
