//! Core types shared by every provider.
//!
//! - [`StoredResource`] - An entity row with its indexed columns
//! - [`Page`], [`CollectionEnvelope`] - Paged results and their wire form
//! - `wire_enum!` - Enums backed by a static name/ordinal table
//!
//! # Examples
//!
//! ```
//! use tessera_persistence::types::{CollectionEnvelope, Page};
//!
//! let page = Page::new(20, vec!["a", "b"]).with_total(22);
//! assert_eq!(page.len(), 2);
//!
//! let envelope: CollectionEnvelope =
//!     serde_json::from_str(r#"{"offset": 20, "value": []}"#).unwrap();
//! assert_eq!(envelope.offset, 20);
//! ```

mod pagination;
mod stored_resource;
pub(crate) mod wire;

pub use pagination::{CollectionEnvelope, Page};
pub use stored_resource::StoredResource;
