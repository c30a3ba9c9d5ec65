//! Integration and unit tests for the BuchWart application.
//!
//! ## Test Modules
//!
//! - **api_tests**: Health, auth and book catalogue endpoint tests
//! - **borrow_tests**: Borrow/return flows including the double-borrow guard
//! - **review_tests**: Review creation, permissions and rating validation
//! - **db_tests**: Schema initialization and constraint tests
//! - **config_tests**: Configuration loading and validation tests
//! - **error_tests**: Error handling and validation helper tests

pub mod support;

pub mod api_tests;
pub mod review_tests;
