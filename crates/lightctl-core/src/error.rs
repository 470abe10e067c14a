//! Error types for LightControl messages

use crate::types::PackageType;
use thiserror::Error;

/// Result type alias for codec operations
pub type Result<T> = std::result::Result<T, Error>;

/// LightControl codec errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Payload shorter than the variant's minimum size
    #[error("invalid message size for {kind}: need {needed} bytes, have {have}")]
    InvalidMessageSize {
        kind: PackageType,
        needed: usize,
        have: usize,
    },

    /// Empty frame, no type tag present
    #[error("empty frame")]
    EmptyFrame,

    /// Tag byte outside the known package type table
    #[error("unknown package type: 0x{0:02x}")]
    UnknownPackageType(u8),

    /// Known package type without a modeled payload
    #[error("unhandled package type: {0}")]
    Unhandled(PackageType),

    /// Inbound-only package type
    #[error("package type {0} cannot be composed")]
    NotComposable(PackageType),

    /// Field value outside its documented range
    #[error("invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: i64 },
}
