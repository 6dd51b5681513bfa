//! Surooh: personal assistant pipeline (secretary → brain → smart core → bots).

pub mod config;
pub mod credentials;
pub mod error;
pub mod integrations;
pub mod llm;
pub mod pipeline;
pub mod server;
pub mod store;
