//! Ranked outcome of testing a route against a request.

/// Result of matching one route, or of a whole dispatch pass.
///
/// Quality ordering: `Ok` beats `WrongMethod` beats `WrongUrl`. The dispatcher
/// keeps the best non-`Ok` outcome seen across all routes so it can tell
/// "no url matched anywhere" (404) from "an url matched with the wrong
/// method" (405).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Match {
    /// The route matched and handled the request.
    Ok,
    /// The url matched but the http method did not.
    WrongMethod,
    /// The url did not match.
    WrongUrl,
}

impl Match {
    /// Strict one-directional comparison: true iff `self` ranks strictly
    /// higher than `other`. Equal ranks are not better.
    pub fn is_better_than(self, other: Match) -> bool {
        self.rank() > other.rank()
    }

    fn rank(self) -> u8 {
        match self {
            Match::Ok => 2,
            Match::WrongMethod => 1,
            Match::WrongUrl => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Match;

    #[test]
    fn quality_ordering() {
        assert!(Match::Ok.is_better_than(Match::WrongMethod));
        assert!(Match::Ok.is_better_than(Match::WrongUrl));
        assert!(Match::WrongMethod.is_better_than(Match::WrongUrl));

        assert!(!Match::WrongUrl.is_better_than(Match::WrongMethod));
        assert!(!Match::WrongMethod.is_better_than(Match::Ok));
    }

    #[test]
    fn equal_ranks_are_not_better() {
        assert!(!Match::Ok.is_better_than(Match::Ok));
        assert!(!Match::WrongMethod.is_better_than(Match::WrongMethod));
        assert!(!Match::WrongUrl.is_better_than(Match::WrongUrl));
    }
}
