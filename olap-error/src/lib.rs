#![deny(missing_docs)]

//! Error handling for the OLAP column storage engine.
//!
//! Every fallible operation of the engine returns an [`OlapResult`]. The variants of
//! [`OlapError`] follow the failure classes of the column encode/decode path: stream set-up,
//! raw I/O, encoding a value, decoding or validating persisted bytes, and finalizing a column.

mod ext;

use std::backtrace::Backtrace;
// Aliased so the `thiserror` derive does not emit the nightly-only `provide` method.
use std::backtrace::Backtrace as CapturedBacktrace;
use std::borrow::Cow;
use std::fmt::{Debug, Display, Formatter};
use std::ops::Deref;
use std::{fmt, io};

pub use ext::*;

/// A string that can be used as an error message.
#[derive(Debug)]
pub struct ErrString(Cow<'static, str>);

impl<T> From<T> for ErrString
where
    T: Into<Cow<'static, str>>,
{
    fn from(msg: T) -> Self {
        Self(msg.into())
    }
}

impl AsRef<str> for ErrString {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Deref for ErrString {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for ErrString {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

/// The top-level error type of the storage engine.
#[derive(thiserror::Error)]
#[non_exhaustive]
pub enum OlapError {
    /// An index is out of bounds.
    #[error("index {0} out of bounds from {1} to {2}\nBacktrace:\n{3}")]
    OutOfBounds(usize, usize, usize, CapturedBacktrace),
    /// An argument is invalid.
    #[error("{0}\nBacktrace:\n{1}")]
    InvalidArgument(ErrString, CapturedBacktrace),
    /// A column writer or reader could not be set up, e.g. a required stream is missing.
    #[error("init failed: {0}\nBacktrace:\n{1}")]
    InitError(ErrString, CapturedBacktrace),
    /// A value cannot be encoded into its column.
    #[error("encode failed: {0}\nBacktrace:\n{1}")]
    EncodeError(ErrString, CapturedBacktrace),
    /// Persisted bytes could not be decoded.
    #[error("decode failed: {0}\nBacktrace:\n{1}")]
    DecodeError(ErrString, CapturedBacktrace),
    /// Persisted bytes do not follow the expected encoding.
    #[error("invalid encoding: {0}\nBacktrace:\n{1}")]
    InvalidEncoding(ErrString, CapturedBacktrace),
    /// A column could not be finalized from its accumulated state.
    #[error("finalize failed: {0}\nBacktrace:\n{1}")]
    FinalizeError(ErrString, CapturedBacktrace),
    /// A reader was asked for rows past the end of its column.
    #[error("end of stream: {0}\nBacktrace:\n{1}")]
    EndOfStream(ErrString, CapturedBacktrace),
    /// A wrapper for other errors, carrying additional context.
    #[error("{0}: {1}")]
    Context(ErrString, #[source] Box<OlapError>),
    /// A wrapper for IO errors.
    #[error(transparent)]
    IOError(#[from] io::Error),
    /// A wrapper for errors from the protobuf library.
    #[cfg(feature = "prost")]
    #[error(transparent)]
    ProstDecode(#[from] prost::DecodeError),
    /// A wrapper for errors from the protobuf library.
    #[cfg(feature = "prost")]
    #[error(transparent)]
    ProstEncode(#[from] prost::EncodeError),
}

impl OlapError {
    /// Adds additional context to an error.
    pub fn with_context<T: Into<ErrString>>(self, msg: T) -> Self {
        OlapError::Context(msg.into(), Box::new(self))
    }

    /// Returns the innermost error, skipping any [`OlapError::Context`] layers.
    pub fn root(&self) -> &OlapError {
        match self {
            OlapError::Context(_, inner) => inner.root(),
            other => other,
        }
    }

    /// Whether the root cause of this error is a read past the end of a column.
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self.root(), OlapError::EndOfStream(..))
    }
}

impl Debug for OlapError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(self, f)
    }
}

/// A type alias for Results that return [`OlapError`] as their error type.
pub type OlapResult<T> = Result<T, OlapError>;

/// A trait for unwrapping an [`OlapResult`] or [`Option`] when the caller holds an invariant
/// that makes failure impossible.
pub trait OlapExpect {
    /// The type of the value being expected.
    type Output;

    /// Returns the value, panicking with the given message if it is missing.
    fn olap_expect(self, msg: &str) -> Self::Output;
}

impl<T, E> OlapExpect for Result<T, E>
where
    E: Into<OlapError>,
{
    type Output = T;

    #[inline(always)]
    fn olap_expect(self, msg: &str) -> Self::Output {
        self.map_err(|err| err.into())
            .unwrap_or_else(|e| olap_panic!(e.with_context(msg.to_string())))
    }
}

impl<T> OlapExpect for Option<T> {
    type Output = T;

    #[inline(always)]
    fn olap_expect(self, msg: &str) -> Self::Output {
        self.unwrap_or_else(|| {
            let err = OlapError::InvalidArgument(msg.to_string().into(), Backtrace::capture());
            olap_panic!(err)
        })
    }
}

/// A convenient macro for creating an [`OlapError`].
#[macro_export]
macro_rules! olap_err {
    (OutOfBounds: $idx:expr, $start:expr, $stop:expr) => {{
        use std::backtrace::Backtrace;
        $crate::__private::must_use(
            $crate::OlapError::OutOfBounds($idx, $start, $stop, Backtrace::capture())
        )
    }};
    ($variant:ident: $fmt:literal $(, $arg:expr)* $(,)?) => {{
        use std::backtrace::Backtrace;
        $crate::__private::must_use(
            $crate::OlapError::$variant(format!($fmt, $($arg),*).into(), Backtrace::capture())
        )
    }};
    ($variant:ident: $err:expr $(,)?) => {
        $crate::__private::must_use(
            $crate::OlapError::$variant($err)
        )
    };
    ($fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::olap_err!(InvalidArgument: $fmt, $($arg),*)
    };
}

/// A convenient macro for returning an [`OlapError`] from the current function.
#[macro_export]
macro_rules! olap_bail {
    ($($tt:tt)+) => {
        return Err($crate::olap_err!($($tt)+))
    };
}

/// A convenient macro for panicking with an [`OlapError`] in the presence of a programmer
/// error (e.g., an invariant has been violated).
#[macro_export]
macro_rules! olap_panic {
    (OutOfBounds: $idx:expr, $start:expr, $stop:expr) => {{
        $crate::olap_panic!($crate::olap_err!(OutOfBounds: $idx, $start, $stop))
    }};
    ($variant:ident: $fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::olap_panic!($crate::olap_err!($variant: $fmt, $($arg),*))
    };
    ($err:expr, $fmt:literal $(, $arg:expr)* $(,)?) => {{
        let err: $crate::OlapError = $err;
        panic!("{}", err.with_context(format!($fmt, $($arg),*)))
    }};
    ($fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::olap_panic!($crate::olap_err!($fmt, $($arg),*))
    };
    ($err:expr) => {{
        let err: $crate::OlapError = $err;
        panic!("{}", err)
    }};
}

#[doc(hidden)]
pub mod __private {
    #[doc(hidden)]
    #[inline]
    #[must_use]
    pub const fn must_use(x: crate::OlapError) -> crate::OlapError {
        x
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fails(len: usize) -> OlapResult<()> {
        if len > 4 {
            olap_bail!(EncodeError: "value of {} bytes exceeds width {}", len, 4);
        }
        Ok(())
    }

    #[test]
    fn bail_uses_requested_variant() {
        let err = fails(5).unwrap_err();
        assert!(matches!(err, OlapError::EncodeError(..)));
        assert!(err.to_string().starts_with("encode failed: value of 5 bytes exceeds width 4"));
    }

    #[test]
    fn context_keeps_root() {
        let err = olap_err!(EndOfStream: "column {} exhausted", 3).with_context("reading batch");
        assert!(err.is_end_of_stream());
        assert!(err.to_string().starts_with("reading batch: end of stream: column 3 exhausted"));
    }

    #[test]
    fn io_errors_convert() {
        let io = io::Error::new(io::ErrorKind::UnexpectedEof, "short read");
        let err: OlapError = io.into();
        assert!(matches!(err, OlapError::IOError(_)));
    }

    #[test]
    #[should_panic(expected = "missing dictionary")]
    fn expect_panics_with_message() {
        let value: Option<u32> = None;
        value.olap_expect("missing dictionary");
    }
}
