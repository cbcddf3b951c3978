//! Holder addresses and asset identifiers.
//!
//! Both are opaque strings issued by the external balance ledger. They are
//! kept as distinct newtypes so a holder can never be passed where an asset
//! is expected.

use crate::error::TypesError;
use serde::{Deserialize, Serialize};
use std::fmt;

fn validate(raw: &str) -> Result<(), TypesError> {
    if raw.chars().any(char::is_whitespace) {
        return Err(TypesError::Whitespace(raw.to_string()));
    }
    Ok(())
}

/// An account on the balance ledger: a holder, proposer, executor, or the
/// target of a governance action.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub struct Address(String);

impl Address {
    /// Create an address from a raw string.
    ///
    /// # Panics
    /// Panics if the string is empty or contains whitespace. Use
    /// [`Address::parse`] for untrusted input.
    pub fn new(raw: impl Into<String>) -> Self {
        match Self::parse(raw) {
            Ok(address) => address,
            Err(e) => panic!("invalid address: {e}"),
        }
    }

    pub fn parse(raw: impl Into<String>) -> Result<Self, TypesError> {
        let s = raw.into();
        if s.is_empty() {
            return Err(TypesError::EmptyAddress);
        }
        validate(&s)?;
        Ok(Self(s))
    }
}

impl TryFrom<String> for Address {
    type Error = TypesError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::parse(raw)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a fractionalised asset (the fungible ledger that represents
/// ownership of one property).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub struct AssetId(String);

impl AssetId {
    /// Create an asset id from a raw string.
    ///
    /// # Panics
    /// Panics if the string is empty or contains whitespace. Use
    /// [`AssetId::parse`] for untrusted input.
    pub fn new(raw: impl Into<String>) -> Self {
        match Self::parse(raw) {
            Ok(asset) => asset,
            Err(e) => panic!("invalid asset id: {e}"),
        }
    }

    pub fn parse(raw: impl Into<String>) -> Result<Self, TypesError> {
        let s = raw.into();
        if s.is_empty() {
            return Err(TypesError::EmptyAssetId);
        }
        validate(&s)?;
        Ok(Self(s))
    }
}

impl TryFrom<String> for AssetId {
    type Error = TypesError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::parse(raw)
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
