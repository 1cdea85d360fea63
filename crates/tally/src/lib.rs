//! External-system access: the ODBC driver seam, the generic collection
//! fetcher, and the HTTP/XML gateway client used for connection checks and
//! company discovery.

pub mod driver;
pub mod fetcher;
pub mod gateway;

#[cfg(feature = "odbc")]
pub mod odbc;
