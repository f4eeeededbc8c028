//! crmfetch - resilient acquisition of CRM records for report generation.
//!
//! The heart of the crate is [`api`]: a client for a webhook-style CRM REST
//! service that respects the upstream rate limit, retries transient
//! failures with exponential backoff, deduplicates identical requests
//! through a short-lived cache, and assembles paged and batched result
//! sets. Report rendering and field-level business validation live
//! downstream of this crate.

pub mod api;
pub mod cli;
pub mod config;
pub mod models;
