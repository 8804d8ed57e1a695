//! Query front end.
//!
//! # Data Flow
//! ```text
//! raw query (literal text or file)
//!     → descriptor.rs (extract @descriptors from the raw text)
//!     → normalize.rs (drop # lines, drop @ lines, escape)
//!     → escape.rs (character ↔ token table)
//!     → schema-safe query + path identifiers
//! ```
//!
//! # Design Decisions
//! - Descriptor extraction and descriptor stripping are independent passes:
//!   extraction always sees the annotated text, the engine never does
//! - Path identifiers are found lexically (`_x...` tokens) before the query
//!   is executed, so unknown paths can be registered up front

pub mod descriptor;
pub mod escape;
pub mod normalize;

pub use descriptor::{parse_descriptors, Descriptor};
pub use escape::{decode, encode, RoutePath};
pub use normalize::{extract_path_identifiers, load_source, normalize};
