use std::io;

use failure_derive::Fail;

/// Errors surfaced from [`Database::open`](crate::Database::open) and from
/// query calls that hit genuine I/O failure.
///
/// `NotOpened`, `InvalidAddress`, and `UnsupportedField` from the design's
/// error taxonomy are deliberately absent here: those are reported through
/// the sentinel-string channel on [`Record`](crate::Record), never as a
/// `Result::Err`, so that a caller cannot accidentally `?`-propagate past a
/// merely-unanswerable query.
#[derive(Debug, Fail)]
pub enum Error {
    /// The file failed header validation at open time: a wrong product
    /// code for its declared year, or a compressed-archive signature where
    /// a BIN header was expected.
    #[fail(display = "Incorrect IP2Location BIN file format. Please make sure that you are using the latest IP2Location BIN file.")]
    InvalidBin,

    /// A positional read failed (short read, past end of file, or the
    /// underlying I/O call itself errored).
    #[fail(display = "I/O error reading BIN file: {}", _0)]
    Io(#[fail(cause)] io::Error),
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::Io(err)
    }
}
