pub mod cache;
pub mod config;
pub mod errors;
pub mod ingest;
pub mod pipeline;
pub mod rules;
pub mod utils;
pub mod validator;
