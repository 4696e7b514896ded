//! Database core.
//!
//! This module wires together the three pieces behind the protocol front
//! end:
//!
//! - [`Store`]: opens and caches one SQLite handle per logical database
//!   name, lazily creating files under the data directory.
//! - [`Session`]: one per client connection; classifies each statement
//!   and routes it to the read or write path against the active handle.
//! - [`StatementReply`]/[`CellValue`]: statement results, with SQLite's
//!   dynamically-typed cells coerced into the wire protocol's value kinds.
//!
//! ```text
//!  connection task ──► Session ──► Store ──► DbHandle (SQLite file)
//!                        │
//!                        └──► StatementReply { Ok | Rows(ResultSet) }
//! ```

mod error;
mod result;
mod session;
mod store;

pub use error::{ServerError, ServerResult};
pub use result::{CellValue, ResultSet, StatementReply};
pub use session::{Session, DEFAULT_DATABASE};
pub use store::{DbHandle, Store};
