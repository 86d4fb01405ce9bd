//! Parse, validate and summarize the textual segment dumps produced by a
//! commit-log broker's log dump tool.
//!
//! The [`segment`] module is the library proper: a lazy, validated batch
//! stream over one dump plus a transactional-info collector. The [`cli`]
//! module backs the `segscan` binary.

pub mod cli;
pub mod segment;
