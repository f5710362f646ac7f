//! Snippet extraction
//!
//! Turns one source file into the scripts to submit. Code files are run
//! whole; Markdown files contribute the bodies of their fenced blocks
//! tagged with the session language.
//!
//! Markdown blocks sharing a `test-set=<n>` tag are merged, in file order,
//! into one script. Within each expected outcome the ungrouped blocks come
//! first, then one merged script per test set in order of first appearance.

pub mod fence;
pub mod profile;

use std::path::Path;

use crate::common::{Error, Result};

pub use fence::{FenceLine, FenceSyntax, Modifiers};
pub use profile::{file_profile, server_profile, DEFAULT_PROFILE};

/// Markdown file suffix
pub const MARKDOWN_SUFFIX: &str = ".md";

/// How a file is turned into snippets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Code,
    Markdown,
}

impl SourceKind {
    /// Classify by suffix; `None` means the file is not runnable
    pub fn classify(path: &Path, code_extension: &str) -> Option<Self> {
        let name = path.to_string_lossy();
        if name.ends_with(MARKDOWN_SUFFIX) {
            Some(SourceKind::Markdown)
        } else if name.ends_with(code_extension) {
            Some(SourceKind::Code)
        } else {
            None
        }
    }
}

/// What the server is expected to do with a snippet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expected {
    Success,
    Failure,
}

/// One fenced block as it appears in the file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snippet {
    pub body: String,
    pub expected: Expected,
    pub test_set: Option<u32>,
}

/// Scripts extracted from one file, ready for submission
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnippetGroup {
    /// Scripts that must run without error
    pub should_run: Vec<String>,
    /// Scripts that must raise an execution error
    pub should_fail: Vec<String>,
    /// 1-based line of a block still open at end of file; its body is dropped
    pub unterminated_at: Option<usize>,
}

impl SnippetGroup {
    /// Group snippets by expected outcome and test set, dropping empty bodies
    pub fn from_snippets(snippets: impl IntoIterator<Item = Snippet>) -> Self {
        let mut run = Bucket::default();
        let mut fail = Bucket::default();
        for snippet in snippets {
            let bucket = match snippet.expected {
                Expected::Success => &mut run,
                Expected::Failure => &mut fail,
            };
            bucket.push(snippet.body, snippet.test_set);
        }
        Self {
            should_run: run.finish(),
            should_fail: fail.finish(),
            unterminated_at: None,
        }
    }

    /// No script to submit
    pub fn is_empty(&self) -> bool {
        self.should_run.is_empty() && self.should_fail.is_empty()
    }
}

#[derive(Default)]
struct Bucket {
    singles: Vec<String>,
    sets: Vec<(u32, Vec<String>)>,
}

impl Bucket {
    fn push(&mut self, body: String, test_set: Option<u32>) {
        if body.is_empty() {
            return;
        }
        match test_set {
            None => self.singles.push(body),
            Some(id) => match self.sets.iter_mut().find(|(set, _)| *set == id) {
                Some((_, bodies)) => bodies.push(body),
                None => self.sets.push((id, vec![body])),
            },
        }
    }

    fn finish(self) -> Vec<String> {
        let mut scripts = self.singles;
        scripts.extend(self.sets.into_iter().map(|(_, bodies)| bodies.join("\n")));
        scripts
    }
}

/// Scan Markdown text for runnable blocks
///
/// Returns the blocks in file order plus the opener line of a block left
/// open at end of input. Delimiter lines are not part of any body, and an
/// opener carrying a skip modifier never opens a region, so its body lines
/// and closing fence are ignored.
pub fn scan_markdown(content: &str, syntax: &FenceSyntax) -> (Vec<Snippet>, Option<usize>) {
    struct Open {
        line: usize,
        snippet: Snippet,
    }

    let mut snippets = Vec::new();
    let mut open: Option<Open> = None;

    for (idx, line) in content.split_inclusive('\n').enumerate() {
        let fence = syntax.classify(line);
        match open.take() {
            Some(done) if fence.end => snippets.push(done.snippet),
            Some(mut current) => {
                current.snippet.body.push_str(line);
                open = Some(current);
            }
            None if fence.opens() => {
                open = Some(Open {
                    line: idx + 1,
                    snippet: Snippet {
                        body: String::new(),
                        expected: if fence.modifiers.should_fail {
                            Expected::Failure
                        } else {
                            Expected::Success
                        },
                        test_set: fence.modifiers.test_set,
                    },
                });
            }
            None => {}
        }
    }

    (snippets, open.map(|o| o.line))
}

/// Extract the scripts of Markdown text
pub fn extract_markdown(content: &str, syntax: &FenceSyntax) -> SnippetGroup {
    let (snippets, unterminated_at) = scan_markdown(content, syntax);
    SnippetGroup {
        unterminated_at,
        ..SnippetGroup::from_snippets(snippets)
    }
}

/// Extract the script of a code file: the whole content
pub fn extract_code(content: String) -> SnippetGroup {
    SnippetGroup::from_snippets([Snippet {
        body: content,
        expected: Expected::Success,
        test_set: None,
    }])
}

/// Read and extract one file
pub fn extract(path: &Path, kind: SourceKind, syntax: &FenceSyntax) -> Result<SnippetGroup> {
    let content = std::fs::read_to_string(path).map_err(|e| Error::file_read(path, &e))?;

    let group = match kind {
        SourceKind::Code => extract_code(content),
        SourceKind::Markdown => extract_markdown(&content, syntax),
    };

    if let Some(line) = group.unterminated_at {
        tracing::warn!(
            "{}: code block opened at line {} is never closed; ignoring it",
            path.display(),
            line
        );
    }

    Ok(group)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::config::MarkerConfig;
    use crate::session::SessionKind;

    fn python() -> FenceSyntax {
        FenceSyntax::new(SessionKind::Python, MarkerConfig::default())
    }

    #[test]
    fn test_classify_by_suffix() {
        assert_eq!(
            SourceKind::classify(Path::new("docs/a.md"), ".py"),
            Some(SourceKind::Markdown)
        );
        assert_eq!(
            SourceKind::classify(Path::new("src/b.py"), ".py"),
            Some(SourceKind::Code)
        );
        assert_eq!(SourceKind::classify(Path::new("src/b.py"), ".groovy"), None);
        assert_eq!(SourceKind::classify(Path::new("img/c.png"), ".py"), None);
    }

    #[test]
    fn test_single_block() {
        let group = extract_markdown("# Title\n\n```python\nprint(1)\n```\n", &python());
        assert_eq!(group.should_run, vec!["print(1)\n".to_string()]);
        assert!(group.should_fail.is_empty());
        assert_eq!(group.unterminated_at, None);
    }

    #[test]
    fn test_code_file_is_one_success_snippet() {
        let group = extract_code("import os\nprint(os.sep)\n".to_string());
        assert_eq!(group.should_run, vec!["import os\nprint(os.sep)\n".to_string()]);
        assert!(group.should_fail.is_empty());
    }

    #[test]
    fn test_empty_code_file_yields_nothing() {
        assert!(extract_code(String::new()).is_empty());
    }

    #[test]
    fn test_skipped_blocks_never_appear() {
        let md = "\
```python skip-test
a = 1
```
```python syntax
def f(x): ...
```
```python
b = 2
```
";
        let group = extract_markdown(md, &python());
        assert_eq!(group.should_run, vec!["b = 2\n".to_string()]);
        assert!(group.should_fail.is_empty());
    }

    #[test]
    fn test_should_fail_bucket() {
        let md = "```python should-fail\nraise ValueError()\n```\n```python\nok = True\n```\n";
        let group = extract_markdown(md, &python());
        assert_eq!(group.should_run, vec!["ok = True\n".to_string()]);
        assert_eq!(group.should_fail, vec!["raise ValueError()\n".to_string()]);
    }

    #[test]
    fn test_test_set_merged_in_file_order() {
        let md = "\
```python test-set=1
a = 1
```

Some prose.

```python test-set=1
print(a)
```
";
        let group = extract_markdown(md, &python());
        assert_eq!(group.should_run, vec!["a = 1\n\nprint(a)\n".to_string()]);
    }

    #[test]
    fn test_ungrouped_first_then_sets_by_first_appearance() {
        let md = "\
```python test-set=2
two_a
```
```python
single_1
```
```python test-set=1
one_a
```
```python test-set=2
two_b
```
```python
single_2
```
";
        let group = extract_markdown(md, &python());
        assert_eq!(
            group.should_run,
            vec![
                "single_1\n".to_string(),
                "single_2\n".to_string(),
                "two_a\n\ntwo_b\n".to_string(),
                "one_a\n".to_string(),
            ]
        );
    }

    #[test]
    fn test_test_sets_are_per_outcome() {
        let md = "\
```python test-set=1
a = 1
```
```python should-fail test-set=1
a.missing
```
";
        let group = extract_markdown(md, &python());
        assert_eq!(group.should_run, vec!["a = 1\n".to_string()]);
        assert_eq!(group.should_fail, vec!["a.missing\n".to_string()]);
    }

    #[test]
    fn test_empty_blocks_dropped() {
        let md = "```python\n```\n```python test-set=4\n```\n";
        let group = extract_markdown(md, &python());
        assert!(group.is_empty());
    }

    #[test]
    fn test_unterminated_block_is_dropped() {
        let md = "```python\nclosed = 1\n```\n\n```python\nnever_closed = 2\n";
        let group = extract_markdown(md, &python());
        assert_eq!(group.should_run, vec!["closed = 1\n".to_string()]);
        assert_eq!(group.unterminated_at, Some(5));
    }

    #[test]
    fn test_other_languages_and_inner_fences() {
        let md = "\
```bash
pip install thing
```
```python
x = '''
```groovy
'''
```
";
        let group = extract_markdown(md, &python());
        // A fence line inside a block closes it, whatever its info string
        assert_eq!(group.should_run, vec!["x = '''\n".to_string()]);
    }

    #[test]
    fn test_crlf_lines_kept_verbatim() {
        let md = "```python\r\nprint(1)\r\n```\r\n";
        let group = extract_markdown(md, &python());
        assert_eq!(group.should_run, vec!["print(1)\r\n".to_string()]);
    }

    #[test]
    fn test_groovy_fences() {
        let syntax = FenceSyntax::new(SessionKind::Groovy, MarkerConfig::default());
        let md = "```python\nx = 1\n```\n```groovy\nprintln 1\n```\n";
        let group = extract_markdown(md, &syntax);
        assert_eq!(group.should_run, vec!["println 1\n".to_string()]);
    }

    #[test]
    fn test_extract_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.md");
        std::fs::write(
            &path,
            "```python test-set=1\na = 1\n```\n```python should-fail\nboom\n```\n```python test-set=1\nb = a\n```\n",
        )
        .unwrap();

        let first = extract(&path, SourceKind::Markdown, &python()).unwrap();
        let second = extract(&path, SourceKind::Markdown, &python()).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.should_run, vec!["a = 1\n\nb = a\n".to_string()]);
        assert_eq!(first.should_fail, vec!["boom\n".to_string()]);
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = extract(&dir.path().join("gone.md"), SourceKind::Markdown, &python()).unwrap_err();
        assert!(matches!(err, Error::FileRead { .. }));
    }
}
