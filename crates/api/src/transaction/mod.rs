// Path: crates/api/src/transaction/mod.rs
//! Types describing a transaction's execution environment.

pub mod context;
