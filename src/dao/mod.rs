/// Database model definitions.
pub mod models;
/// Request queue and session gate storage backends.
pub mod request_store;
/// Storage abstraction layer for database operations.
pub mod storage;
