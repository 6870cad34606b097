//! Shared primitive types used across the entire engine.

/// Originator or beneficiary identifier in a transaction.
pub type AccountId = String;

/// Opaque, externally supplied transaction identifier.
pub type TxId = String;
