pub mod config;
pub mod credential_store;
pub mod error;
pub mod gemini_client;
pub mod history_repository;
pub mod logging;
pub mod storage;
