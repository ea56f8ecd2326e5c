//! Binary `class` file format
//!
//! Everything here is structural: parsing checks the layout of the bytes, and leaves the meaning
//! of the constants and attributes to the runtime.

mod attribute;
mod binary_format;
mod builder;
mod class;
mod constants;
mod field;
mod method;
mod version;

pub use attribute::*;
pub use binary_format::{Deserialize, Serialize};
pub use builder::*;
pub use class::*;
pub use constants::*;
pub use field::*;
pub use method::*;
pub use version::*;
