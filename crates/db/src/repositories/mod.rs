//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&SqlitePool` as the first argument.

pub mod company_log_repo;
pub mod company_repo;

pub use company_log_repo::CompanyLogRepo;
pub use company_repo::{AddOutcome, CompanyRepo, EditOutcome, StoreError};
