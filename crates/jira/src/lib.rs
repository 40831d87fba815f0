//! Ticketforge Jira infrastructure adapter.
//!
//! Implements the [`pipeline::IssueTracker`] trait over the Jira REST v2 API
//! using [`reqwest`] with HTTP basic authentication (account email plus API
//! token).
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** This crate must not contain domain rules. All Jira API
//! details (endpoint paths, body shapes, error-text classification,
//! authentication) are handled here; the [`pipeline`] crate never sees them.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`config`] | `JiraConfig`: validated connection settings |
//! | [`client`] | `JiraClient`: the `IssueTracker` implementation |
//! | [`rejection`] | Classification of `400 Bad Request` bodies |
//! | `wire` | Request and response bodies |

pub mod client;
pub mod config;
pub mod rejection;
mod wire;

pub use client::JiraClient;
pub use config::JiraConfig;
pub use rejection::classify_rejection;
