//! Errors raised while constructing fundamental types.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypesError {
    #[error("address must not be empty")]
    EmptyAddress,

    #[error("asset id must not be empty")]
    EmptyAssetId,

    #[error("address contains whitespace: {0:?}")]
    Whitespace(String),
}
