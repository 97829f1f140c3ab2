pub mod client;
pub mod extractor;
pub mod fetch;

pub use client::{GmailClient, GmailError, MessageSource};
pub use extractor::{extract_event, extract_url, GmailMessage};
pub use fetch::AuthenticatedFetch;
