// LINE Messaging API integration
//
// Reply delivery, loading-animation indicator, profile lookup, and webhook
// signature verification.

pub mod client;
pub mod signature;

pub use client::{LineConfig, LineMessagingClient};
