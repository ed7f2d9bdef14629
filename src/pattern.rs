//! Uri pattern compilation and matching.
//!
//! A pattern string like `/bye/:whom` is compiled once, at registration time,
//! into a sequence of literal and named-placeholder segments. Matching a
//! request uri against a compiled pattern is a segment-by-segment comparison:
//! same segment count, literals compared exactly, placeholders capturing any
//! non-empty value in declaration order.

/// Leading sigil marking a path segment as a named placeholder.
pub const PARAM_SIGIL: char = ':';

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

/// A compiled uri pattern.
///
/// Immutable after compilation. The number of placeholders is fixed and is
/// checked against the declared handler arity when the route is registered,
/// so a mismatch can never surface during request handling.
#[derive(Debug, Clone)]
pub struct UriPattern {
    raw: String,
    segments: Vec<Segment>,
    param_count: usize,
}

impl UriPattern {
    /// Compiles a pattern string.
    ///
    /// Splitting happens on `/`; any segment starting with [`PARAM_SIGIL`]
    /// becomes a named placeholder, everything else is a literal.
    pub fn compile(pattern: &str) -> Self {
        let segments: Vec<Segment> = pattern
            .split('/')
            .map(|segment| match segment.strip_prefix(PARAM_SIGIL) {
                Some(name) => Segment::Param(name.to_string()),
                None => Segment::Literal(segment.to_string()),
            })
            .collect();

        let param_count = segments.iter().filter(|s| matches!(s, Segment::Param(_))).count();

        Self { raw: pattern.to_string(), segments, param_count }
    }

    /// The pattern string this was compiled from.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Number of named placeholders in the pattern.
    pub fn param_count(&self) -> usize {
        self.param_count
    }

    /// Matches `uri` against the pattern.
    ///
    /// On a match, returns the placeholder values extracted left to right.
    /// Placeholders never match an empty segment; literal segments must be
    /// equal; the segment counts must be identical.
    pub fn extract<'uri>(&self, uri: &'uri str) -> Option<Vec<&'uri str>> {
        let mut params = Vec::with_capacity(self.param_count);
        let mut segments = self.segments.iter();

        for part in uri.split('/') {
            match segments.next()? {
                Segment::Literal(literal) if literal == part => {}
                Segment::Literal(_) => return None,
                Segment::Param(_) if part.is_empty() => return None,
                Segment::Param(_) => params.push(part),
            }
        }

        // uri exhausted: the pattern must be too
        if segments.next().is_some() {
            return None;
        }

        Some(params)
    }

    /// True when `uri` matches the pattern, ignoring extracted values.
    pub fn matches(&self, uri: &str) -> bool {
        self.extract(uri).is_some()
    }
}

/// Counts the placeholders of an uncompiled pattern string.
pub fn params_count(pattern: &str) -> usize {
    pattern.split('/').filter(|segment| segment.starts_with(PARAM_SIGIL)).count()
}

#[cfg(test)]
mod tests {
    use super::{UriPattern, params_count};

    #[test]
    fn literal_pattern_matches_exactly() {
        let pattern = UriPattern::compile("/hello");

        assert_eq!(pattern.param_count(), 0);
        assert_eq!(pattern.extract("/hello"), Some(vec![]));
        assert_eq!(pattern.extract("/hello/world"), None);
        assert_eq!(pattern.extract("/helloo"), None);
        assert_eq!(pattern.extract("/"), None);
    }

    #[test]
    fn root_pattern() {
        let pattern = UriPattern::compile("/");

        assert_eq!(pattern.extract("/"), Some(vec![]));
        assert_eq!(pattern.extract("/index"), None);
    }

    #[test]
    fn placeholders_capture_in_order() {
        let pattern = UriPattern::compile("/add/:left/:right");

        assert_eq!(pattern.param_count(), 2);
        assert_eq!(pattern.extract("/add/22/20"), Some(vec!["22", "20"]));
        assert_eq!(pattern.extract("/add/22"), None);
        assert_eq!(pattern.extract("/add/22/20/1"), None);
        assert_eq!(pattern.extract("/sub/22/20"), None);
    }

    #[test]
    fn placeholder_rejects_empty_segment() {
        let pattern = UriPattern::compile("/bye/:whom");

        assert_eq!(pattern.extract("/bye/Bob"), Some(vec!["Bob"]));
        assert_eq!(pattern.extract("/bye/"), None);
    }

    #[test]
    fn trailing_slash_is_not_ignored() {
        let pattern = UriPattern::compile("/hello");

        assert!(!pattern.matches("/hello/"));
    }

    #[test]
    fn counts_params_without_compiling() {
        assert_eq!(params_count("/"), 0);
        assert_eq!(params_count("/hello"), 0);
        assert_eq!(params_count("/bye/:whom"), 1);
        assert_eq!(params_count("/add/:left/:right"), 2);
    }
}
