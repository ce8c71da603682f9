use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("unknown frequency: {value}")]
    UnknownFrequency { value: String },
}

impl Error {
    #[must_use]
    pub fn unknown_frequency(value: impl Into<String>) -> Self {
        Self::UnknownFrequency {
            value: value.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can be built from a bare message.
///
/// Implement this for a crate's error type, then invoke [`impl_context!`]
/// in its error module.
pub trait FromMessage: Sized {
    fn from_message(message: String) -> Self;
}

/// Generate a crate-local `Context` trait adding `.context()` and
/// `.with_context()` to any `Result` whose error is `Display`.
///
/// The invoking module must define `Error: FromMessage` and a `Result<T>`
/// alias.
///
/// ```ignore
/// // in crates/delivery/src/error.rs
/// herald_common::impl_context!();
/// ```
#[macro_export]
macro_rules! impl_context {
    () => {
        pub trait Context<T> {
            fn context(self, context: impl Into<String>) -> Result<T>;

            fn with_context<C: Into<String>>(self, f: impl FnOnce() -> C) -> Result<T>;
        }

        impl<T, E: std::fmt::Display> Context<T> for std::result::Result<T, E> {
            fn context(self, context: impl Into<String>) -> Result<T> {
                self.with_context(|| context)
            }

            fn with_context<C: Into<String>>(self, f: impl FnOnce() -> C) -> Result<T> {
                self.map_err(|source| {
                    let context: String = f().into();
                    <Error as $crate::FromMessage>::from_message(format!("{context}: {source}"))
                })
            }
        }
    };
}
