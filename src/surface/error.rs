use thiserror::Error;

/// Errors raised while configuring or running a surface generation.
///
/// Degenerate geometry (coincident atoms, a probe that cannot touch three
/// atoms at once, singular plane intersections) is not an error: the
/// affected torus or cavity is skipped and generation continues.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SurfaceError {
    #[error("unsupported geodesic level {level} (supported levels are 0..={max})")]
    UnsupportedGeodesicLevel { level: usize, max: usize },

    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    #[error("invalid atom {index}: {reason}")]
    InvalidAtom { index: usize, reason: String },

    #[error("selection covers {found} atoms but {expected} atoms were given")]
    SelectionSize { expected: usize, found: usize },

    /// A torus failed one of its consistency checks. This is a defect in the
    /// pipeline itself; the whole call is aborted.
    #[error("torus between atoms {a} and {b} is inconsistent: {reason}")]
    TorusInvariant { a: usize, b: usize, reason: String },

    #[error("unknown surface property '{0}'")]
    UnknownProperty(String),

    #[error("invalid value '{value}' for surface property '{name}'")]
    InvalidPropertyValue { name: String, value: String },

    #[error("surface generation was cancelled")]
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_atoms() {
        let err = SurfaceError::TorusInvariant {
            a: 3,
            b: 17,
            reason: "odd cavity count 3".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains('3') && msg.contains("17"), "got '{msg}'");
        assert!(msg.contains("odd cavity count"), "got '{msg}'");
    }

    #[test]
    fn level_error_reports_the_range() {
        let err = SurfaceError::UnsupportedGeodesicLevel { level: 9, max: 4 };
        assert_eq!(
            err.to_string(),
            "unsupported geodesic level 9 (supported levels are 0..=4)"
        );
    }
}
