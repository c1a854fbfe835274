// Knowledge-base retrieve-and-generate client

pub mod client;
pub mod types;

pub use client::{GenerationConfig, RetrieveAndGenerateClient};
