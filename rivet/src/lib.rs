//! Typed value driver core
//!
//! Statements are sent over a framed binary RPC connection, parameters
//! and results are [`TypedValue`]s tagged with their [`WireType`][wire::WireType].
//!
//! # Examples
//!
//! ```no_run
//! use rivet::{Connection, Config};
//!
//! # async fn app() -> rivet::Result<()> {
//! let conn = Connection::connect_with(Config::from_env()).await?;
//!
//! let mut binder = conn.binder();
//! binder.bind(420)?.bind("Foo")?;
//!
//! let mut rows = conn.execute("SELECT id, name FROM foo WHERE id = ? OR name = ?", binder.finish())
//!     .await?
//!     .rows()?;
//!
//! while rows.has_next().await? {
//!     let row = rows.next()?;
//!     let (id, name) = row.decode_as::<(i32, String)>()?;
//!     println!("{id}: {name}");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! User defined types are read and written through [`Prototype`]:
//!
//! ```
//! use rivet::{PrototypeBuilder, TypedValue};
//!
//! let point = PrototypeBuilder::new("Point")
//!     .field(1i32)
//!     .field(2i32)
//!     .finish();
//!
//! let value = TypedValue::from_prototype(point);
//! let wire = rivet::serialize(&value).unwrap();
//! assert_eq!(rivet::deserialize(&wire).unwrap(), value);
//! ```

mod common;
mod ext;
mod net;

// Protocol
pub mod wire;
pub mod transport;

// Values
pub mod types;
pub mod value;
pub mod prototype;
pub mod codec;
pub mod stream;

// Results
pub mod row;
pub mod fetch;

// Connection
pub mod queue;
pub mod connection;

pub mod error;

pub use value::{FromValue, ToValue, TypedValue, WireTyped};
pub use prototype::{FromPrototype, Prototype, PrototypeBuilder, TypeMap};
pub use codec::{Binder, deserialize, serialize};
pub use row::{FromRow, Row};
pub use fetch::{ExecuteResult, FrameCursor};
pub use connection::{Config, Connection};
pub use error::{Error, Result};

#[cfg(feature = "macros")]
pub use rivet_macros::{FromPrototype, FromRow};
