//! Reader for IP2Location-style proprietary BIN geolocation database files.
//!
//! A BIN file maps IP address ranges to geolocation fields (country, region,
//! city, ISP, coordinates, timezone, mobile network codes, and so on) and
//! ships as a single binary blob: a fixed header, one sorted range table per
//! address family, a length-prefixed string heap, and an optional prefix
//! index. [`Database::open`] memory-maps such a file; [`Database::query`]
//! and [`Database::query_all`] look an address up and decode the requested
//! columns into a [`Record`].
//!
//! ```no_run
//! use ip2location_bin::{Database, Fields};
//!
//! let db = Database::open("IP-COUNTRY.BIN")?;
//! let record = db.query_all("8.8.8.8")?;
//! println!("{}", record.country_short);
//!
//! let just_country = db.query("2001:4860:4860::8888", Fields::COUNTRY_SHORT)?;
//! println!("{}", just_country.country_short);
//! # Ok::<(), ip2location_bin::Error>(())
//! ```

#[macro_use]
extern crate serde_derive;

mod database;
mod error;
mod ip;
mod record;
mod schema;
mod source;

pub use database::Database;
pub use error::Error;
pub use record::{
    Fields, Record, INVALID_ADDRESS as INVALID_ADDRESS_MESSAGE, INVALID_DATABASE as INVALID_DATABASE_MESSAGE,
    NOT_SUPPORTED as NOT_SUPPORTED_MESSAGE,
};
