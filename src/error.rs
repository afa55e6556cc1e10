//! Error types for the lithophane pipeline.

use std::fmt;
use thiserror::Error;

/// Result type used throughout the library.
pub type Result<T> = std::result::Result<T, LithoError>;

/// Identifies the operation step an error was raised for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationRef {
    /// Position of the step in the operation sequence.
    pub index: usize,
    /// The step's `type` string.
    pub kind: String,
}

impl OperationRef {
    pub fn new(index: usize, kind: impl Into<String>) -> Self {
        Self {
            index,
            kind: kind.into(),
        }
    }
}

impl fmt::Display for OperationRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "operation #{} ({})", self.index, self.kind)
    }
}

fn at(operation: &Option<OperationRef>) -> String {
    match operation {
        Some(op) => format!(" in {op}"),
        None => String::new(),
    }
}

/// Everything that can go wrong between a pixel buffer and an STL file.
#[derive(Debug, Error)]
pub enum LithoError {
    /// A numeric or enumerated parameter is out of range.
    #[error("invalid parameter{}: {message}", at(.operation))]
    InvalidParameter {
        operation: Option<OperationRef>,
        message: String,
    },

    /// Crop rectangle is empty or leaves the image.
    #[error("invalid crop{}: {message}", at(.operation))]
    InvalidCrop {
        operation: Option<OperationRef>,
        message: String,
    },

    /// Operation type outside the closed set this crate understands.
    #[error("unsupported {operation}")]
    UnsupportedOperation { operation: OperationRef },

    /// Height field contains a value no solid can be built from.
    #[error("invalid height field{}: {message}", at(.operation))]
    InvalidHeightField {
        operation: Option<OperationRef>,
        message: String,
    },

    /// Height field has no cells to triangulate.
    #[error(
        "empty mesh{}: height field is {width}x{height}, need at least 2x2 samples",
        at(.operation)
    )]
    EmptyMesh {
        operation: Option<OperationRef>,
        width: usize,
        height: usize,
    },

    /// Requested geometry cannot be built (e.g. build angle too steep).
    #[error("geometry error{}: {message}", at(.operation))]
    Geometry {
        operation: Option<OperationRef>,
        message: String,
    },

    /// Reading or writing mesh bytes failed.
    #[error("I/O error while {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// The caller raised the abort signal.
    #[error("build aborted")]
    Aborted,
}

impl LithoError {
    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            operation: None,
            message: message.into(),
        }
    }

    pub fn invalid_crop(message: impl Into<String>) -> Self {
        Self::InvalidCrop {
            operation: None,
            message: message.into(),
        }
    }

    pub fn geometry(message: impl Into<String>) -> Self {
        Self::Geometry {
            operation: None,
            message: message.into(),
        }
    }

    pub fn invalid_height_field(message: impl Into<String>) -> Self {
        Self::InvalidHeightField {
            operation: None,
            message: message.into(),
        }
    }

    pub fn empty_mesh(width: usize, height: usize) -> Self {
        Self::EmptyMesh {
            operation: None,
            width,
            height,
        }
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Malformed STL content, reported as an `Io` error of kind `InvalidData`.
    pub fn invalid_data(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::io(
            context,
            std::io::Error::new(std::io::ErrorKind::InvalidData, message.into()),
        )
    }

    /// Attach the failing step to errors that can carry one.
    ///
    /// An operation already recorded on the error is kept.
    pub fn in_operation(mut self, op: &OperationRef) -> Self {
        match &mut self {
            Self::InvalidParameter { operation, .. }
            | Self::InvalidCrop { operation, .. }
            | Self::InvalidHeightField { operation, .. }
            | Self::EmptyMesh { operation, .. }
            | Self::Geometry { operation, .. } => {
                if operation.is_none() {
                    *operation = Some(op.clone());
                }
            }
            _ => {}
        }
        self
    }

    /// The operation step this error was raised for, if known.
    pub fn operation(&self) -> Option<&OperationRef> {
        match self {
            Self::InvalidParameter { operation, .. }
            | Self::InvalidCrop { operation, .. }
            | Self::InvalidHeightField { operation, .. }
            | Self::EmptyMesh { operation, .. }
            | Self::Geometry { operation, .. } => operation.as_ref(),
            Self::UnsupportedOperation { operation } => Some(operation),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_names_operation() {
        let err = LithoError::invalid_parameter("width_mm must be > 0")
            .in_operation(&OperationRef::new(1, "set_lithophane_parameters"));
        assert_eq!(
            err.to_string(),
            "invalid parameter in operation #1 (set_lithophane_parameters): width_mm must be > 0"
        );
        assert_eq!(err.operation().map(|op| op.index), Some(1));
    }

    #[test]
    fn test_in_operation_keeps_first() {
        let err = LithoError::geometry("too steep")
            .in_operation(&OperationRef::new(0, "grayscale"))
            .in_operation(&OperationRef::new(3, "set_lithophane_parameters"));
        assert_eq!(err.operation().map(|op| op.index), Some(0));
    }

    #[test]
    fn test_empty_mesh_tagged() {
        let err = LithoError::empty_mesh(1, 40)
            .in_operation(&OperationRef::new(0, "set_lithophane_parameters"));
        assert_eq!(
            err.to_string(),
            "empty mesh in operation #0 (set_lithophane_parameters): height field is 1x40, need at least 2x2 samples"
        );
        let err = LithoError::invalid_height_field("NaN at (0, 0)")
            .in_operation(&OperationRef::new(2, "set_lithophane_parameters"));
        assert_eq!(err.operation().map(|op| op.index), Some(2));
    }

    #[test]
    fn test_message_without_operation() {
        let err = LithoError::invalid_crop("zero width");
        assert_eq!(err.to_string(), "invalid crop: zero width");
        assert!(err.operation().is_none());
    }
}
