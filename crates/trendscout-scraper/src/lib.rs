pub mod client;
pub mod error;
pub mod normalize;
pub(crate) mod retry;
pub mod source;
pub mod target;
pub mod types;

pub use client::ApifyClient;
pub use error::ScraperError;
pub use normalize::{normalize_batch, normalize_post};
pub use source::{ContentSource, SourceBatch, SourceRequest, UnconfiguredSource};
pub use target::resolve_target;
pub use types::{RawPost, RunData};
