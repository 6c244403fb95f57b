// Copyright (c) 2025 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Property Path Parser
 * Parses dotted and bracketed key paths into validated segments
 *
 * Features:
 * - Dotted segments (a.b.c) and bracketed segments (a[0], a['b.c'])
 * - Reserved segment detection before any store traversal
 * - Bounded array indices to cap auto-extension
 *
 * @copyright 2025 Bountyy Oy
 * @license Proprietary
 */

use crate::errors::PathError;

/// Segment names that must never be resolved during user-driven traversal.
/// These are the property names deep-merge utilities follow into an object's
/// behavioral template, which is what turns a single write into process-wide
/// contamination.
pub const RESERVED_SEGMENTS: &[&str] = &["__proto__", "constructor", "prototype"];

/// Default cap on array indices created by auto-extension
pub const DEFAULT_MAX_AUTO_INDEX: usize = 10_000;

/// One parsed path segment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

impl PathSegment {
    pub fn is_reserved(&self) -> bool {
        match self {
            PathSegment::Key(name) => RESERVED_SEGMENTS.contains(&name.as_str()),
            PathSegment::Index(_) => false,
        }
    }
}

impl std::fmt::Display for PathSegment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathSegment::Key(name) => write!(f, "{}", name),
            PathSegment::Index(idx) => write!(f, "[{}]", idx),
        }
    }
}

/// A fully parsed property path
///
/// Parsing is eager and complete: a path either parses into a segment list
/// or fails, and nothing is allocated in the store either way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyPath {
    raw: String,
    segments: Vec<PathSegment>,
}

impl PropertyPath {
    /// Parse a raw key path with the default index cap
    pub fn parse(raw: &str) -> Result<Self, PathError> {
        Self::parse_with_cap(raw, DEFAULT_MAX_AUTO_INDEX)
    }

    /// Parse a raw key path, rejecting indices above `max_index`
    pub fn parse_with_cap(raw: &str, max_index: usize) -> Result<Self, PathError> {
        if raw.is_empty() {
            return Err(PathError::Empty);
        }

        let bytes = raw.as_bytes();
        let len = bytes.len();
        let mut segments = Vec::new();
        let mut i = 0;
        // True when a dot has promised a segment that has not appeared yet
        let mut expect_segment = true;

        while i < len {
            match bytes[i] {
                b'.' => {
                    if expect_segment {
                        return Err(PathError::EmptySegment { position: segments.len() });
                    }
                    expect_segment = true;
                    i += 1;
                }
                b'[' => {
                    let (segment, next) = Self::parse_bracket(raw, i, max_index)?;
                    segments.push(segment);
                    expect_segment = false;
                    i = next;
                }
                _ => {
                    let end = raw[i..]
                        .find(['.', '['])
                        .map(|off| i + off)
                        .unwrap_or(len);
                    segments.push(PathSegment::Key(raw[i..end].to_string()));
                    expect_segment = false;
                    i = end;
                }
            }
        }

        if expect_segment {
            return Err(PathError::EmptySegment { position: segments.len() });
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    /// Parse one bracketed segment starting at the `[` at byte `start`.
    /// Returns the segment and the byte offset just past the closing `]`.
    fn parse_bracket(
        raw: &str,
        start: usize,
        max_index: usize,
    ) -> Result<(PathSegment, usize), PathError> {
        let bytes = raw.as_bytes();
        let len = bytes.len();
        let content_start = start + 1;

        if content_start >= len {
            return Err(PathError::UnterminatedBracket { position: start });
        }

        // Quoted bracket contents are always string keys; dots and digits
        // inside quotes never split or index.
        let quote = bytes[content_start];
        if quote == b'\'' || quote == b'"' {
            let inner_start = content_start + 1;
            let close_quote = raw[inner_start..]
                .find(quote as char)
                .map(|off| inner_start + off)
                .ok_or(PathError::UnterminatedBracket { position: start })?;
            if close_quote + 1 >= len || bytes[close_quote + 1] != b']' {
                return Err(PathError::UnterminatedBracket { position: start });
            }
            let key = raw[inner_start..close_quote].to_string();
            return Ok((PathSegment::Key(key), close_quote + 2));
        }

        let close = raw[content_start..]
            .find(']')
            .map(|off| content_start + off)
            .ok_or(PathError::UnterminatedBracket { position: start })?;
        let content = &raw[content_start..close];

        if content.is_empty() {
            return Err(PathError::EmptyBracket { position: start });
        }

        let segment = if content.bytes().all(|b| b.is_ascii_digit()) {
            match content.parse::<usize>() {
                Ok(index) if index <= max_index => PathSegment::Index(index),
                Ok(index) => {
                    return Err(PathError::IndexOutOfRange { index, max: max_index });
                }
                // Digit runs too long for usize are ordinary string keys,
                // just as oversized numerics stop being valid array indices
                // in JavaScript and become plain properties.
                Err(_) => PathSegment::Key(content.to_string()),
            }
        } else {
            PathSegment::Key(content.to_string())
        };

        Ok((segment, close + 1))
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// First reserved segment, with its position in the segment list
    pub fn reserved_segment(&self) -> Option<(usize, &str)> {
        self.segments.iter().enumerate().find_map(|(pos, seg)| match seg {
            PathSegment::Key(name) if seg.is_reserved() => Some((pos, name.as_str())),
            _ => None,
        })
    }

    /// Whether any segment touches the reserved deny-list
    pub fn is_reserved(&self) -> bool {
        self.reserved_segment().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(path: &PropertyPath) -> Vec<String> {
        path.segments().iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_simple_dotted_path() {
        let path = PropertyPath::parse("a.b.c").unwrap();
        assert_eq!(
            path.segments(),
            &[
                PathSegment::Key("a".to_string()),
                PathSegment::Key("b".to_string()),
                PathSegment::Key("c".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_single_key() {
        let path = PropertyPath::parse("polluted").unwrap();
        assert_eq!(path.segments(), &[PathSegment::Key("polluted".to_string())]);
    }

    #[test]
    fn test_parse_bracket_index() {
        let path = PropertyPath::parse("a.b[0].c").unwrap();
        assert_eq!(
            path.segments(),
            &[
                PathSegment::Key("a".to_string()),
                PathSegment::Key("b".to_string()),
                PathSegment::Index(0),
                PathSegment::Key("c".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_leading_bracket() {
        let path = PropertyPath::parse("[3].x").unwrap();
        assert_eq!(
            path.segments(),
            &[PathSegment::Index(3), PathSegment::Key("x".to_string())]
        );
    }

    #[test]
    fn test_parse_quoted_brackets_do_not_split_on_dots() {
        let path = PropertyPath::parse("a['b.c'].d").unwrap();
        assert_eq!(keys(&path), vec!["a", "b.c", "d"]);

        let path = PropertyPath::parse(r#"a["0"]"#).unwrap();
        assert_eq!(
            path.segments(),
            &[
                PathSegment::Key("a".to_string()),
                PathSegment::Key("0".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_unquoted_non_numeric_bracket_is_key() {
        let path = PropertyPath::parse("a[name]").unwrap();
        assert_eq!(
            path.segments(),
            &[
                PathSegment::Key("a".to_string()),
                PathSegment::Key("name".to_string()),
            ]
        );
    }

    #[test]
    fn test_dotted_numeric_stays_key() {
        // Whether "1" addresses an array slot is decided at assignment time,
        // based on the container it lands on.
        let path = PropertyPath::parse("a.1.b").unwrap();
        assert_eq!(
            path.segments()[1],
            PathSegment::Key("1".to_string())
        );
    }

    #[test]
    fn test_parse_bracket_after_bracket() {
        let path = PropertyPath::parse("grid[1][2]").unwrap();
        assert_eq!(
            path.segments(),
            &[
                PathSegment::Key("grid".to_string()),
                PathSegment::Index(1),
                PathSegment::Index(2),
            ]
        );
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(PropertyPath::parse(""), Err(PathError::Empty));
        assert_eq!(
            PropertyPath::parse(".a"),
            Err(PathError::EmptySegment { position: 0 })
        );
        assert_eq!(
            PropertyPath::parse("a..b"),
            Err(PathError::EmptySegment { position: 1 })
        );
        assert_eq!(
            PropertyPath::parse("a."),
            Err(PathError::EmptySegment { position: 1 })
        );
        assert_eq!(
            PropertyPath::parse("a["),
            Err(PathError::UnterminatedBracket { position: 1 })
        );
        assert_eq!(
            PropertyPath::parse("a[0"),
            Err(PathError::UnterminatedBracket { position: 1 })
        );
        assert_eq!(
            PropertyPath::parse("a['x]"),
            Err(PathError::UnterminatedBracket { position: 1 })
        );
        assert_eq!(
            PropertyPath::parse("a[]"),
            Err(PathError::EmptyBracket { position: 1 })
        );
    }

    #[test]
    fn test_index_cap() {
        assert!(PropertyPath::parse_with_cap("a[10]", 10).is_ok());
        assert_eq!(
            PropertyPath::parse_with_cap("a[11]", 10),
            Err(PathError::IndexOutOfRange { index: 11, max: 10 })
        );
    }

    #[test]
    fn test_oversized_digit_run_is_key() {
        let path = PropertyPath::parse("a[99999999999999999999999999]").unwrap();
        assert_eq!(
            path.segments()[1],
            PathSegment::Key("99999999999999999999999999".to_string())
        );
    }

    #[test]
    fn test_reserved_segment_detection() {
        let path = PropertyPath::parse("__proto__.polluted").unwrap();
        assert_eq!(path.reserved_segment(), Some((0, "__proto__")));

        let path = PropertyPath::parse("a.constructor.x").unwrap();
        assert_eq!(path.reserved_segment(), Some((1, "constructor")));

        let path = PropertyPath::parse("constructor[prototype][isAdmin]").unwrap();
        assert_eq!(path.reserved_segment(), Some((0, "constructor")));

        let path = PropertyPath::parse("a[__proto__].b").unwrap();
        assert_eq!(path.reserved_segment(), Some((1, "__proto__")));
    }

    #[test]
    fn test_quoted_reserved_segment_still_detected() {
        // The deny-list sees decoded segment text, so quoting is no escape.
        let path = PropertyPath::parse(r#"a["__proto__"].b"#).unwrap();
        assert!(path.is_reserved());
    }

    #[test]
    fn test_benign_path_is_not_reserved() {
        let path = PropertyPath::parse("prototype_design.notes").unwrap();
        assert!(!path.is_reserved());

        let path = PropertyPath::parse("a.proto.b").unwrap();
        assert!(!path.is_reserved());
    }
}
