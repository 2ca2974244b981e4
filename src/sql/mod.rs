//! Statement builder for module tables: identifiers from config only, values as cast parameters.

mod builder;
pub mod params;
pub use builder::*;
pub use params::*;
