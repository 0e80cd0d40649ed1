//! Property listing operations.
//!
//! This crate is the pure half of the property data offload mechanism:
//!
//! - **Records**: [`PropertyRecord`], a lenient view over a listing's JSON fields
//! - **Filter**: price range and property type constraints
//! - **Search**: case-insensitive free text over title, description and address
//! - **Sort**: stable sort by price or title, ascending or descending
//! - **Stats**: count and price aggregates
//! - **Operations**: the typed [`Operation`] union and its wire payload
//!
//! Nothing here blocks, allocates threads, or mutates its input.
//!
//! # Example
//!
//! ```
//! use estate_offload_ops::{FilterSpec, PriceRange, PropertyRecord, filter};
//! use serde_json::json;
//!
//! let listings: Vec<PropertyRecord> = [
//!     json!({"id": 1, "price": "150"}),
//!     json!({"id": 2, "price": "abc"}),
//!     json!({"id": 3, "price": 250}),
//! ]
//! .into_iter()
//! .map(|v| PropertyRecord::from_value(v).unwrap())
//! .collect();
//!
//! let spec = FilterSpec::new().with_price_range(PriceRange::between(100.0, 200.0));
//! let kept = filter(&listings, &spec);
//! assert_eq!(kept.len(), 1);
//! assert_eq!(kept[0].price(), 150.0);
//! ```

mod error;
pub mod filter;
pub mod operation;
pub mod record;
pub mod search;
pub mod sort;
pub mod stats;
mod wire_float;

pub use error::{OpsError, Result};
pub use filter::{ALL_TYPES, FilterSpec, PriceRange, filter};
pub use operation::{Operation, OperationKind, OperationOutput};
pub use record::{PropertyRecord, coerce_price, decode_properties};
pub use search::search;
pub use sort::{SortKey, SortOrder, sort};
pub use stats::{PropertyStats, UNSPECIFIED_TYPE, stats};
