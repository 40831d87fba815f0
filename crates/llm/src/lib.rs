//! Ticketforge LLM provider infrastructure adapter.
//!
//! Implements the [`pipeline::LlmProvider`] trait for Google Gemini. Other
//! providers are added as new modules in this crate without changes to the
//! `pipeline` crate.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** HTTP transport, request formatting, response parsing
//! and exponential back-off live here. The [`pipeline`] crate sees only
//! [`pipeline::LlmProvider`].
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`gemini`] | `GeminiProvider` and its wire types |
//! | [`http_client`] | `LlmHttpClient`: shared client with retry |

pub mod gemini;
pub mod http_client;

pub use gemini::{GeminiProvider, DEFAULT_MODEL, GEMINI_API_BASE};
pub use http_client::LlmHttpClient;
