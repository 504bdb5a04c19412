use std::fs;
use std::path::Path;

use log::{debug, info};

use crate::error::Result;

/// Builds the mailing list for one send: the sending account first, then
/// every line of `path` in file order.
///
/// An empty or nonexistent `path` yields just the sender. Lines are kept as
/// written apart from their terminator; nothing is trimmed, deduplicated, or
/// validated here.
pub fn load_recipients(sender: &str, path: &str) -> Result<Vec<String>> {
    let mut recipients = vec![sender.to_string()];

    if path.is_empty() {
        return Ok(recipients);
    }
    let path = Path::new(path);
    if !path.exists() {
        debug!("mailing list file {} does not exist", path.display());
        return Ok(recipients);
    }

    info!("loading recipients from file");
    let contents = fs::read_to_string(path)?;
    recipients.extend(contents.lines().map(str::to_string));
    Ok(recipients)
}
