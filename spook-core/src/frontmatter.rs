//! Splits a content file into its `+++`-fenced TOML metadata and the
//! markdown body that follows it.

use std::fmt;

pub const DELIMITER: &[u8] = b"+++";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrontMatterError {
    MissingOpeningDelimiter,
    MissingClosingDelimiter,
}

impl fmt::Display for FrontMatterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrontMatterError::MissingOpeningDelimiter => {
                write!(f, "malformed content: must begin with `+++`")
            }
            FrontMatterError::MissingClosingDelimiter => {
                write!(f, "malformed content: missing closing `+++`")
            }
        }
    }
}

impl std::error::Error for FrontMatterError {}

/// Returns `(metadata, body)`. Both slices borrow from `content`.
pub fn split(content: &[u8]) -> Result<(&[u8], &[u8]), FrontMatterError> {
    let mut lines = Lines::new(content);

    match lines.next_line() {
        Some((_, line)) if is_delimiter(line) => {}
        _ => return Err(FrontMatterError::MissingOpeningDelimiter),
    }

    let metadata_start = lines.offset;
    while let Some((start, line)) = lines.next_line() {
        if is_delimiter(line) {
            return Ok((&content[metadata_start..start], &content[lines.offset..]));
        }
    }

    Err(FrontMatterError::MissingClosingDelimiter)
}

/// Body of `content` with any metadata block removed. Content without a
/// well-formed block is returned unchanged.
pub fn strip(content: &[u8]) -> &[u8] {
    match split(content) {
        Ok((_, body)) => body,
        Err(_) => content,
    }
}

fn is_delimiter(line: &[u8]) -> bool {
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    line == DELIMITER
}

/// Line reader over raw bytes that remembers where the next line starts.
struct Lines<'a> {
    content: &'a [u8],
    offset: usize,
}

impl<'a> Lines<'a> {
    fn new(content: &'a [u8]) -> Self {
        Self { content, offset: 0 }
    }

    fn next_line(&mut self) -> Option<(usize, &'a [u8])> {
        if self.offset >= self.content.len() {
            return None;
        }

        let start = self.offset;
        let rest = &self.content[start..];
        match rest.iter().position(|&b| b == b'\n') {
            Some(end) => {
                self.offset = start + end + 1;
                Some((start, &rest[..end]))
            }
            None => {
                self.offset = self.content.len();
                Some((start, rest))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lines() {
        let mut lines = Lines::new(b"a\r\nbc\nd");
        assert_eq!(lines.next_line(), Some((0, &b"a\r"[..])));
        assert_eq!(lines.next_line(), Some((3, &b"bc"[..])));
        assert_eq!(lines.offset, 6);
        assert_eq!(lines.next_line(), Some((6, &b"d"[..])));
        assert_eq!(lines.next_line(), None);
    }

    #[test]
    fn test_split() {
        let input = b"+++\ntitle = \"Hello\"\n+++\n# Body\n";
        let (metadata, body) = split(input).unwrap();
        assert_eq!(metadata, b"title = \"Hello\"\n");
        assert_eq!(body, b"# Body\n");
    }

    #[test]
    fn test_split_crlf() {
        let input = b"+++\r\ntitle = \"Hello\"\r\n+++\r\nBody";
        let (metadata, body) = split(input).unwrap();
        assert_eq!(metadata, b"title = \"Hello\"\r\n");
        assert_eq!(body, b"Body");
    }

    #[test]
    fn test_closing_delimiter_at_eof() {
        let (metadata, body) = split(b"+++\ntitle = \"x\"\n+++").unwrap();
        assert_eq!(metadata, b"title = \"x\"\n");
        assert!(body.is_empty());
    }

    #[test]
    fn test_empty_metadata() {
        let (metadata, body) = split(b"+++\n+++\ntext").unwrap();
        assert!(metadata.is_empty());
        assert_eq!(body, b"text");
    }

    #[test]
    fn test_missing_opening() {
        assert_eq!(
            split(b"title = \"x\"\n+++\nbody"),
            Err(FrontMatterError::MissingOpeningDelimiter)
        );
        assert_eq!(split(b""), Err(FrontMatterError::MissingOpeningDelimiter));
        // The delimiter has to be the whole line.
        assert_eq!(
            split(b"++++\n+++\n"),
            Err(FrontMatterError::MissingOpeningDelimiter)
        );
    }

    #[test]
    fn test_missing_closing() {
        assert_eq!(
            split(b"+++\ntitle = \"x\"\nbody +++ inline\n"),
            Err(FrontMatterError::MissingClosingDelimiter)
        );
    }

    #[test]
    fn test_strip() {
        assert_eq!(strip(b"+++\na = 1\n+++\nbody"), b"body");
        assert_eq!(strip(b"no metadata"), b"no metadata");
    }
}
