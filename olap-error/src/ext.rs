use crate::{ErrString, OlapResult};

/// Extension trait for [`OlapResult`].
pub trait ResultExt<T>: private::Sealed {
    /// Wrap the error, if any, with a context message computed lazily.
    fn context<F, M>(self, f: F) -> OlapResult<T>
    where
        F: FnOnce() -> M,
        M: Into<ErrString>;
}

mod private {
    use crate::OlapResult;

    pub trait Sealed {}

    impl<T> Sealed for OlapResult<T> {}
}

impl<T> ResultExt<T> for OlapResult<T> {
    fn context<F, M>(self, f: F) -> OlapResult<T>
    where
        F: FnOnce() -> M,
        M: Into<ErrString>,
    {
        self.map_err(|e| e.with_context(f()))
    }
}
