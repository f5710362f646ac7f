//! Server profile tags
//!
//! A Markdown page can declare which server image it needs with a
//! `docker-config=<name>` tag anywhere in its text. Pages without one, and
//! plain code files, belong to the default profile.

use std::path::Path;

use crate::common::{Error, Result};

use super::SourceKind;

/// Profile of files that carry no tag
pub const DEFAULT_PROFILE: &str = "default";

const PROFILE_TAG: &str = "docker-config=";

/// The first profile named in `content`, if any
pub fn server_profile(content: &str) -> Option<&str> {
    content.match_indices(PROFILE_TAG).find_map(|(idx, _)| {
        let rest = &content[idx + PROFILE_TAG.len()..];
        let name = &rest[..rest.find(char::is_whitespace).unwrap_or(rest.len())];
        (!name.is_empty()).then_some(name)
    })
}

/// Profile a file belongs to
pub fn file_profile(path: &Path, kind: SourceKind) -> Result<String> {
    match kind {
        SourceKind::Code => Ok(DEFAULT_PROFILE.to_string()),
        SourceKind::Markdown => {
            let content =
                std::fs::read_to_string(path).map_err(|e| Error::file_read(path, &e))?;
            Ok(server_profile(&content)
                .unwrap_or(DEFAULT_PROFILE)
                .to_string())
        }
    }
}
