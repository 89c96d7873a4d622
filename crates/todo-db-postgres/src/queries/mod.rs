//! SQL query implementations.

pub mod crud;
