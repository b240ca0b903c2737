//! Error types for buffer writes and reads.

use std::error::Error;
use std::fmt;

/// Errors from [`SegmentBuffer`](crate::SegmentBuffer) and
/// [`Tensor`](crate::Tensor) operations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BufferError {
    /// An index along some axis is out of range.
    IndexOutOfRange {
        /// Which axis was indexed.
        axis: &'static str,
        /// The requested index.
        index: usize,
        /// Length of that axis.
        len: usize,
    },
    /// A source slice does not match the destination size.
    LengthMismatch {
        /// Which tensor was being written.
        what: &'static str,
        /// Expected element count.
        expected: usize,
        /// Actual element count.
        got: usize,
    },
}

impl fmt::Display for BufferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IndexOutOfRange { axis, index, len } => {
                write!(f, "{axis} index {index} out of range (len={len})")
            }
            Self::LengthMismatch {
                what,
                expected,
                got,
            } => write!(f, "{what}: expected {expected} elements, got {got}"),
        }
    }
}

impl Error for BufferError {}
