pub mod classification_cache;
pub mod config;
pub mod credential_store;
pub mod error;
pub mod navigator;
pub mod notifier;
pub mod openai_client;
pub mod state_repository;
