//! # litemux-server
//!
//! One network endpoint, many SQLite databases.
//!
//! litemux speaks the MySQL client/server protocol on a single listening
//! address and maps every client-selected database name 1:1 onto a
//! private SQLite file under a data directory, creating files lazily as
//! names are first used. Statements a MySQL client sends but SQLite does
//! not understand are translated (`SHOW …`) or acknowledged without
//! execution (`SET …`); everything else is handed to SQLite as-is, and
//! SQLite's loosely-typed results are coerced back into the protocol's
//! integer/float/text value kinds.
//!
//! This crate provides:
//!
//! - **Database core** ([`database`]): the [`Store`] that owns one open
//!   handle per logical database, the per-connection [`Session`] adapter,
//!   and result shaping.
//! - **MySQL front end** ([`mysql`]): the accept loop and the protocol
//!   callbacks bridging connections to sessions.
//! - **Configuration** ([`config`]): flags, environment and TOML file.
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use litemux_server::{MysqlServer, ServerConfig, Store};
//!
//! let config = ServerConfig::default();
//! let store = Arc::new(Store::open(&config.data_dir, &config.db_options)?);
//! MysqlServer::new(store, config).serve().await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Server configuration.
pub mod config;

/// Database store, session adapter and result shaping.
pub mod database;

/// MySQL protocol front end.
pub mod mysql;

// Re-export commonly used types
pub use config::ServerConfig;
pub use database::{
    CellValue, DbHandle, ResultSet, ServerError, ServerResult, Session, StatementReply, Store,
    DEFAULT_DATABASE,
};
pub use mysql::MysqlServer;
