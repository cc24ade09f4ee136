//! Public SDK for ordered stream composition.
//!
//! This crate re-exports all functionality:
//!
//! ```ignore
//! use fanin_sdk::prelude::*;
//!
//! async fn page(user: String) -> Result<Vec<u8>, StreamError> {
//!     let mut builder = StreamBuilder::from_iter(["<html><body>"]);
//!     builder.push(Source::deferred(async move { format!("<h1>{}</h1>", user) }));
//!     builder.push(Source::factory(|| Source::deferred(load_recommendations())));
//!     builder.push("</body></html>");
//!
//!     builder.build().collect_bytes().await
//! }
//! ```

pub use fanin_core;
pub use fanin_observability;
pub use fanin_stream;

/// Prelude for convenient imports.
pub mod prelude {
    pub use fanin_core::*;
    pub use fanin_observability::*;
    pub use fanin_stream::*;
}
