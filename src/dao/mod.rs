/// Database model definitions.
pub mod models;
/// Session and vote storage operations.
pub mod session_store;
/// Storage abstraction layer for persistence errors.
pub mod storage;
