use thiserror::Error;

#[derive(Error, Debug)]
pub enum FiberAssignError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("No cost configuration for target class: {0}")]
    MissingClassConfig(String),

    #[error("Calibration class {0} does not define numRequired")]
    MissingNumRequired(String),

    #[error("Invalid cost for class {class}: {reason}")]
    InvalidCost { class: String, reason: String },

    #[error("Expected {expected} visits, found {found}")]
    VisitCountMismatch { expected: usize, found: usize },

    #[error("Visit {visit}: expected {expected} target positions, found {found}")]
    PositionCountMismatch {
        visit: usize,
        expected: usize,
        found: usize,
    },

    #[error("Cobra index {index} out of range (bench has {len} cobras)")]
    CobraOutOfRange { index: usize, len: usize },

    #[error("Invalid observation time (expected YYYY-MM-DDTHH:MM:SSZ): {0}")]
    InvalidTimeFormat(String),

    #[error("Cannot build a raster from an empty point set")]
    EmptyRaster,

    #[error("The catalog contains no target")]
    EmptyCatalog,

    #[error("Unable to perform file operation: {0}")]
    IoError(#[from] std::io::Error),
}

impl PartialEq for FiberAssignError {
    fn eq(&self, other: &Self) -> bool {
        use FiberAssignError::*;
        match (self, other) {
            (InvalidParameter(a), InvalidParameter(b)) => a == b,
            (MissingClassConfig(a), MissingClassConfig(b)) => a == b,
            (MissingNumRequired(a), MissingNumRequired(b)) => a == b,
            (
                InvalidCost {
                    class: a,
                    reason: ra,
                },
                InvalidCost {
                    class: b,
                    reason: rb,
                },
            ) => a == b && ra == rb,
            (
                VisitCountMismatch {
                    expected: ea,
                    found: fa,
                },
                VisitCountMismatch {
                    expected: eb,
                    found: fb,
                },
            ) => ea == eb && fa == fb,
            (
                PositionCountMismatch {
                    visit: va,
                    expected: ea,
                    found: fa,
                },
                PositionCountMismatch {
                    visit: vb,
                    expected: eb,
                    found: fb,
                },
            ) => va == vb && ea == eb && fa == fb,
            (
                CobraOutOfRange {
                    index: ia,
                    len: la,
                },
                CobraOutOfRange {
                    index: ib,
                    len: lb,
                },
            ) => ia == ib && la == lb,
            (InvalidTimeFormat(a), InvalidTimeFormat(b)) => a == b,

            // io::Error is not comparable: same variant is enough
            (IoError(_), IoError(_)) => true,

            (EmptyRaster, EmptyRaster) => true,
            (EmptyCatalog, EmptyCatalog) => true,

            _ => false,
        }
    }
}
