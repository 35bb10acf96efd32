//! Cadenza Server Client
//!
//! HTTP implementations of the collaborator contracts consumed by the
//! Cadenza playback core.
//!
//! # Features
//!
//! - **Catalog**: paged collection listing (`HttpCatalog`)
//! - **Stream heads**: ranged downloads for the prefetch cache (`HttpStreamFetcher`)
//!
//! # Example
//!
//! ```ignore
//! use cadenza_core::{Catalog, CollectionId};
//! use cadenza_server_client::{CadenzaServerClient, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::with_token("https://music.example.com", "token");
//!     let client = CadenzaServerClient::new(config)?;
//!
//!     let page = client.catalog().fetch_page(&CollectionId::new("pl-1"), 0).await?;
//!     println!("First page has {} tracks", page.tracks.len());
//!
//!     Ok(())
//! }
//! ```

mod catalog;
mod client;
mod error;
mod stream;
mod types;

pub use catalog::HttpCatalog;
pub use client::CadenzaServerClient;
pub use error::{Result, ServerClientError};
pub use stream::HttpStreamFetcher;
pub use types::{CollectionPageResponse, ServerConfig, ServerTrack};
