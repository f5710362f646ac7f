//! Fence line classification
//!
//! Every Markdown line is classified once into whether it opens or closes a
//! runnable block and, for openers, which modifiers it carries.

use crate::common::config::MarkerConfig;
use crate::session::SessionKind;

/// Modifiers found on a fence opener line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Modifiers {
    /// `skip-test` or `syntax`: never run this block
    pub skip: bool,
    /// `should-fail`: the block must raise an execution error
    pub should_fail: bool,
    /// `test-set=<n>`: merge with other blocks of the same set
    pub test_set: Option<u32>,
}

/// Classification of one line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FenceLine {
    /// Line starts with the opening delimiter
    pub start: bool,
    /// Line starts with the closing delimiter
    pub end: bool,
    /// Only populated for opener lines
    pub modifiers: Modifiers,
}

impl FenceLine {
    /// An opener that should begin a snippet region
    pub fn opens(&self) -> bool {
        self.start && !self.modifiers.skip
    }
}

/// Delimiters and modifier spellings for one session kind
#[derive(Debug, Clone)]
pub struct FenceSyntax {
    start: String,
    end: String,
    markers: MarkerConfig,
}

impl FenceSyntax {
    pub fn new(kind: SessionKind, markers: MarkerConfig) -> Self {
        Self {
            start: kind.fence_start(),
            end: kind.fence_end().to_string(),
            markers,
        }
    }

    pub fn classify(&self, line: &str) -> FenceLine {
        let start = line.starts_with(&self.start);
        let end = line.starts_with(&self.end);
        let modifiers = if start {
            self.modifiers(line)
        } else {
            Modifiers::default()
        };
        FenceLine {
            start,
            end,
            modifiers,
        }
    }

    fn modifiers(&self, line: &str) -> Modifiers {
        Modifiers {
            skip: self
                .markers
                .skip
                .iter()
                .any(|m| !m.is_empty() && line.contains(m.as_str())),
            should_fail: !self.markers.should_fail.is_empty()
                && line.contains(self.markers.should_fail.as_str()),
            test_set: first_number_after(line, &self.markers.test_set),
        }
    }
}

/// The integer directly following the first occurrence of `prefix` that has one
fn first_number_after(line: &str, prefix: &str) -> Option<u32> {
    if prefix.is_empty() {
        return None;
    }
    line.match_indices(prefix).find_map(|(idx, _)| {
        let rest = &line[idx + prefix.len()..];
        let digits_len = rest.bytes().take_while(u8::is_ascii_digit).count();
        rest[..digits_len].parse().ok()
    })
}
