pub mod client;
pub mod paginate;
pub mod types;

pub use client::{GithubClient, GithubError, Page, PageItems, PageQuery};
pub use paginate::{paginate, FetchOutcome};
pub use types::*;
