//! Tracks how long you actively work in an editor, per project and day, broken down by language
//! and framework. A host editor talks to `timetrack serve` over JSON lines, the other commands
//! read and edit the recorded ledgers offline.

pub mod classify;
pub mod cli;
pub mod config;
pub mod ledger;
pub mod storage;
pub mod tracker;
pub mod utils;
