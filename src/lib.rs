//! A single-file relational store: one fixed-schema table persisted as a
//! B+ tree of 4096-byte pages, plus the tiny SQL prompt that drives it.

#[macro_use]
pub mod errors;
pub mod repl;
pub mod sql;
pub mod storage;
