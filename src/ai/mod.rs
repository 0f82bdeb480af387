//! Generative AI service seam and adapters.

pub mod client;
pub mod remote;

pub use client::{GenerationRequest, GenerativeClient};
