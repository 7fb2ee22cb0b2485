//! Browsing contexts
//!
//! A target is one page execution context reachable through a `PageChannel`.
//! The registry tracks which target is active; `DocumentPage` is the
//! HTTP-backed page implementation the CLI crawls with.

mod document;
mod fetcher;
mod registry;

pub use document::{DocumentPage, PageSnapshot};
pub use fetcher::{build_http_client, fetch_document, FetchedDocument};
pub use registry::{TargetContext, TargetHandle, TargetProvider, TargetRegistry};
