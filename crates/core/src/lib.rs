//! Pure domain logic shared by every other crate: semantic value types and
//! the total conversion function, the declarative collection registry, and
//! well-known constants. No I/O and no internal dependencies.

pub mod registry;
pub mod types;
pub mod value;
