//! Errors
//!
//! Custom error types used throughout the `sortforest` crate.
use thiserror::Error;

/// Broad classification of a [`SortForestError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid caller input: parameters, ids, thresholds or data values.
    Config,
    /// Internal bookkeeping no longer agrees with itself, or an external tree does not fit the data.
    Consistency,
    /// Memory could not be obtained.
    Resource,
    /// Reading or writing a model or configuration failed.
    Io,
}

/// Errors that can occur while building or growing a tree.
#[derive(Debug, Error)]
pub enum SortForestError {
    /// First value is the name of the parameter, second is expected, third is what was passed.
    #[error("Invalid parameter value passed for {0}, expected {1} but {2} provided.")]
    InvalidParameter(String, String, String),
    /// Feature index, number of features.
    #[error("Feature index {0} is out of range, the data has {1} features.")]
    FeatureOutOfRange(usize, usize),
    /// Row index, number of rows.
    #[error("Data point {0} is out of range, the data has {1} rows.")]
    RowOutOfRange(usize, usize),
    /// Node id, number of nodes.
    #[error("Node {0} does not exist, the tree has {1} nodes.")]
    NodeOutOfRange(usize, usize),
    #[error("Node {0} has no data points and cannot be split.")]
    EmptyNode(usize),
    #[error("Data point {0} appears more than once in the active set.")]
    DuplicateId(usize),
    #[error("Sample weight {1} of data point {0} is not positive.")]
    NonPositiveSampleWeight(usize, f64),
    /// Row, column.
    #[error("A NaN value was found in the data at row {0}, column {1}.")]
    NanValueFound(usize, usize),
    /// Operation, description of the mismatch.
    #[error("Inconsistent state in {0}: {1}")]
    Inconsistent(String, String),
    #[error("The sorted feature table of node {0} is not available.")]
    StaleFeatureTable(usize),
    #[error("Unable to allocate {0}.")]
    AllocationFailed(String),
    /// Unable to write model to file.
    #[error("Unable to write model to file: {0}")]
    UnableToWrite(String),
    /// Unable to read model from file.
    #[error("Unable to read model from a file {0}")]
    UnableToRead(String),
    #[error("Unrecognized byte order marker {0:#010x}.")]
    BadByteOrderMarker(u32),
}

impl SortForestError {
    pub(crate) fn inconsistent(operation: &str, what: impl Into<String>) -> Self {
        SortForestError::Inconsistent(operation.to_string(), what.into())
    }

    /// The class of failure this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SortForestError::InvalidParameter(..)
            | SortForestError::FeatureOutOfRange(..)
            | SortForestError::RowOutOfRange(..)
            | SortForestError::NodeOutOfRange(..)
            | SortForestError::EmptyNode(..)
            | SortForestError::DuplicateId(..)
            | SortForestError::NonPositiveSampleWeight(..)
            | SortForestError::NanValueFound(..) => ErrorKind::Config,
            SortForestError::Inconsistent(..) | SortForestError::StaleFeatureTable(..) => ErrorKind::Consistency,
            SortForestError::AllocationFailed(..) => ErrorKind::Resource,
            SortForestError::UnableToWrite(..)
            | SortForestError::UnableToRead(..)
            | SortForestError::BadByteOrderMarker(..) => ErrorKind::Io,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(SortForestError::EmptyNode(3).kind(), ErrorKind::Config);
        assert_eq!(SortForestError::NanValueFound(1, 2).kind(), ErrorKind::Config);
        assert_eq!(
            SortForestError::inconsistent("separate", "count mismatch").kind(),
            ErrorKind::Consistency
        );
        assert_eq!(SortForestError::StaleFeatureTable(4).kind(), ErrorKind::Consistency);
        assert_eq!(
            SortForestError::AllocationFailed("arena".to_string()).kind(),
            ErrorKind::Resource
        );
        assert_eq!(SortForestError::BadByteOrderMarker(7).kind(), ErrorKind::Io);
    }

    #[test]
    fn test_error_messages() {
        let e = SortForestError::inconsistent("separate", "expected 3 yes ids, found 2");
        assert_eq!(e.to_string(), "Inconsistent state in separate: expected 3 yes ids, found 2");
        let e = SortForestError::BadByteOrderMarker(0x0403_0201);
        assert_eq!(e.to_string(), "Unrecognized byte order marker 0x04030201.");
    }
}
