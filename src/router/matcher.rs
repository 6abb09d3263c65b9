//! Path matching for registered routes.
//!
//! A route path is either *exact* (`/users`) or *parameterized* (`/users/:id`). A segment is
//! a parameter when it is a `:` followed by an ASCII alphanumeric character; a bare `:` is a
//! literal segment.
//!
//! Exact paths compare by plain string equality. Parameterized paths compare segment by
//! segment after splitting on `/`: once a path is parameterized, every segment that is `:` plus
//! a name binds the request's segment at the same position, literal segments must be equal, and
//! the segment counts must agree. A single trailing slash on the request path is ignored.

use crate::context::PathParams;

/// A single path segment, either a literal string or a named capture (`:name`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Segment {
    Static(String),
    Parameter(String),
}

/// Compiled representation of a route path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Pattern {
    Exact(String),
    Parameterized { segments: Vec<Segment> },
}

/// Returns the parameter name if `segment` is a `:name` segment.
pub(crate) fn parameter_name(segment: &str) -> Option<&str> {
    let name = segment.strip_prefix(':')?;
    name.chars()
        .next()
        .filter(char::is_ascii_alphanumeric)
        .map(|_| name)
}

/// `true` when any segment of `path` is a `:name` parameter.
pub fn is_parameterized(path: &str) -> bool {
    path.split('/').any(|segment| parameter_name(segment).is_some())
}

impl Pattern {
    pub(crate) fn parse(path: &str) -> Self {
        if !is_parameterized(path) {
            return Pattern::Exact(path.to_owned());
        }

        let segments = path
            .split('/')
            .map(|segment| match segment.strip_prefix(':') {
                Some(name) if !name.is_empty() => Segment::Parameter(name.to_owned()),
                _ => Segment::Static(segment.to_owned()),
            })
            .collect();

        Pattern::Parameterized { segments }
    }

    pub(crate) fn is_parameterized(&self) -> bool {
        matches!(self, Pattern::Parameterized { .. })
    }

    /// Matches `path`, returning the bound parameters on success.
    ///
    /// Each call builds its own parameter map, so a failed attempt never leaves bindings
    /// behind for the next candidate.
    pub(crate) fn matches(&self, path: &str) -> Option<PathParams> {
        match self {
            Pattern::Exact(p) => (p == path).then(PathParams::new),
            Pattern::Parameterized { segments } => {
                let mut request: Vec<&str> = path.split('/').collect();
                if request.last() == Some(&"") {
                    request.pop();
                }

                if segments.len() != request.len() {
                    return None;
                }

                let mut params = PathParams::new();
                for (segment, value) in segments.iter().zip(request) {
                    match segment {
                        Segment::Static(s) if s != value => return None,
                        Segment::Static(_) => {}
                        Segment::Parameter(name) => params.insert(name.as_str(), value),
                    }
                }
                Some(params)
            }
        }
    }
}
