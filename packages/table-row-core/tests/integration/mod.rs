//! Integration test suite.
//!
//! 1. Row lifecycle against a catalog and a memory store
//! 2. Ancestor formulas and context assembly
//! 3. JSON file store round trips

pub mod ancestry_tests;
pub mod helpers;
pub mod lifecycle_tests;
pub mod store_tests;
