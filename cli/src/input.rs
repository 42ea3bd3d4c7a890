use std::io::Read;
use std::path::Path;

use crate::error::CliError;

const HARD_MAX_TEXT_INPUT_BYTES: u64 = 64 * 1024 * 1024;

/// Reads text from a file, or from stdin when `path` is `-`, refusing more than `max_bytes`.
pub(crate) fn load_text_limited(path: &Path, max_bytes: u64) -> Result<String, CliError> {
    let max_bytes = max_bytes.min(HARD_MAX_TEXT_INPUT_BYTES);
    let limit = max_bytes.saturating_add(1);
    let mut bytes = Vec::<u8>::new();

    if path.as_os_str() == "-" {
        std::io::stdin()
            .take(limit)
            .read_to_end(&mut bytes)
            .map_err(privacy_guard::Error::from)?;
    } else {
        std::fs::File::open(path)
            .map_err(privacy_guard::Error::from)?
            .take(limit)
            .read_to_end(&mut bytes)
            .map_err(privacy_guard::Error::from)?;
    }

    if bytes.len() as u64 > max_bytes {
        return Err(CliError::Input(format!(
            "{} exceeds {max_bytes} bytes",
            path.display()
        )));
    }
    String::from_utf8(bytes)
        .map_err(|_| CliError::Input(format!("{} is not valid utf-8", path.display())))
}
