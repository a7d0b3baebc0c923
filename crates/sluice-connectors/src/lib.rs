//! # Sluice Connectors
//!
//! Backend connectors for the Sluice data-access layer.
//!
//! Every backend implements the same [`Connector`] contract over the
//! canonical type system and query IR from `sluice-core`:
//!
//! - [`sql`]: relational stores through parameterized statement
//!   generation and pooled `tokio-postgres` sessions
//! - [`tablestore`]: a NoSQL table store with a restricted query
//!   language, continuation-token paging, capped batches, and
//!   eventually consistent table lifecycle
//! - [`flatfile`]: directory trees of CSV files with
//!   incoming/processed/rejected state
//!
//! Callers adapt per backend through [`Capabilities`] instead of
//! failing at call time, and cancellation is a first-class
//! [`WriteOutcome`], not an error.

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod connector;
pub mod error;
pub mod flatfile;
pub mod reader;
pub mod sql;
pub mod tablestore;

pub use connector::{
    validate_identifier, Capabilities, ConnectionState, Connector, WriteOutcome,
};
pub use error::{ConnectorError, Result};
pub use reader::{RowReader, RowStream, VecRowStream};
