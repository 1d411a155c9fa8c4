//! Roll Daemon - shared roll history and broadcast server
//!
//! This crate provides the core infrastructure for the roll daemon:
//! - `history` - History actor owning the shared roll log
//! - `server` - TCP socket server for client connections
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     rolld daemon                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  ┌─────────────────┐     ┌─────────────────────────────┐   │
//! │  │   RollServer    │────▶│      HistoryActor           │   │
//! │  │  (TCP socket)   │     │   (roll log owner)          │   │
//! │  └────────┬────────┘     └──────────────┬──────────────┘   │
//! │           │                             │                   │
//! │           │ connections                 │ events            │
//! │           ▼                             ▼                   │
//! │  ┌─────────────────┐     ┌─────────────────────────────┐   │
//! │  │ConnectionHandler│     │   broadcast::Sender         │   │
//! │  │  (per client)   │     │  (roll distribution)        │   │
//! │  └─────────────────┘     └─────────────────────────────┘   │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! All production code in this crate follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations return `Result` or `Option`
//! - Channel operations handle closure gracefully

pub mod history;
pub mod server;
