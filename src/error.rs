use std::borrow::Cow;

/// Everything that can go wrong while demangling a symbol.
///
/// Parse failures carry the byte offset of the deepest point the parser
/// reached, so messages render as `<reason> at <offset>` the way the
/// reference demanglers report them.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The input does not start with any recognised mangling prefix.
    /// Filter-style callers treat this as "pass the token through".
    #[error("not a mangled symbol")]
    NotMangled,

    /// Malformed mangled input.
    #[error("{reason} at {offset}")]
    Parse {
        reason: Cow<'static, str>,
        offset: usize,
    },

    /// A `T<n>_` reference with no enclosing template scope.
    #[error("template parameter not in scope at {offset}")]
    TemplateParamOutOfScope { offset: usize },

    /// An `S<seq>_` reference past the end of the substitution table, or a
    /// Rust `B<n>_` reference whose target never finished parsing.
    #[error("invalid substitution index at {offset}")]
    SubstitutionOutOfRange { offset: usize },

    /// Parser or formatter recursion exceeded the configured bound.
    #[error("recursion limit reached")]
    RecursionLimit,

    /// `MaxLength` was hit. Carries the prefix of the output that fit, so
    /// callers may still use it.
    #[error("output truncated")]
    Truncated(String),
}

impl Error {
    pub(crate) fn parse(reason: &'static str, offset: usize) -> Error {
        Error::Parse {
            reason: Cow::Borrowed(reason),
            offset,
        }
    }

    /// The offset reported to the caller, if this error carries one.
    pub fn offset(&self) -> Option<usize> {
        match *self {
            Error::Parse { offset, .. }
            | Error::TemplateParamOutOfScope { offset }
            | Error::SubstitutionOutOfRange { offset } => Some(offset),
            _ => None,
        }
    }
}

pub(crate) type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_errors_render_with_offset() {
        let err = Error::parse("unparsed characters at end of mangled name", 4);
        assert_eq!(
            err.to_string(),
            "unparsed characters at end of mangled name at 4"
        );
        assert_eq!(err.offset(), Some(4));
    }
}
