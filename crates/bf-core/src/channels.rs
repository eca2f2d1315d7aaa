use std::{fs, io, path::Path};

use crate::{domain::Channel, errors::Error, Result};

/// Load the channel list (`<channel id>|<display name>` per line).
///
/// A missing file is a configuration error; an empty list is allowed but
/// every request will then come back empty.
pub fn load_channels(path: &Path) -> Result<Vec<Channel>> {
    let contents = fs::read_to_string(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => Error::ChannelList {
            path: path.to_path_buf(),
            reason: "file not found".to_string(),
        },
        _ => Error::Io(e),
    })?;

    let channels = parse_channels(&contents);
    if channels.is_empty() {
        tracing::warn!(path = %path.display(), "channel list is empty, searches will find nothing");
    } else {
        tracing::info!(path = %path.display(), count = channels.len(), "loaded channels");
    }
    Ok(channels)
}

/// Parse channel lines; blank lines and `#` comments are skipped, malformed
/// lines are logged and skipped, duplicate ids keep the first entry.
pub fn parse_channels(contents: &str) -> Vec<Channel> {
    let mut out: Vec<Channel> = Vec::new();

    for (idx, raw) in contents.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((id, name)) = line.split_once('|') else {
            tracing::warn!(line = idx + 1, "skipping channel line without '|' separator");
            continue;
        };
        let (id, name) = (id.trim(), name.trim());
        if id.is_empty() || name.is_empty() || name.contains('|') {
            tracing::warn!(line = idx + 1, "skipping malformed channel line");
            continue;
        }
        if out.iter().any(|c| c.id == id) {
            tracing::warn!(line = idx + 1, channel = id, "skipping duplicate channel id");
            continue;
        }

        out.push(Channel::new(id, name));
    }

    out
}
