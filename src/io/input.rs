use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use flate2::read::GzDecoder;

/// Read a CHAT transcript, transparently decompressing `.gz` files.
///
/// Invalid UTF-8 sequences are replaced rather than rejected; some corpora
/// carry stray Latin-1 bytes in comments.
pub fn read_transcript(path: &Path) -> Result<String> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read file: {:?}", path))?;

    let bytes = if path.extension().is_some_and(|ext| ext == "gz") {
        let mut decoder = GzDecoder::new(&bytes[..]);
        let mut decompressed = Vec::new();
        decoder
            .read_to_end(&mut decompressed)
            .with_context(|| format!("Failed to decompress file: {:?}", path))?;
        decompressed
    } else {
        bytes
    };

    Ok(decode_text(&bytes))
}

/// Decode bytes as UTF-8, dropping a leading byte-order mark
fn decode_text(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

/// Output prefix for an input path: the file name without `.gz` and `.cha`
pub fn default_prefix(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = name.strip_suffix(".gz").unwrap_or(&name);
    let name = name.strip_suffix(".cha").unwrap_or(name);
    name.to_string()
}
