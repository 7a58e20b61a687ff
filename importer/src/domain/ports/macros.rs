//! `define_port_error!`: port error enums whose variants carry one text field.
//!
//! ```ignore
//! define_port_error! {
//!     pub enum RecapCacheError {
//!         Backend { message: String } => "recap cache backend failure: {message}",
//!     }
//! }
//! let err = RecapCacheError::backend("connection refused");
//! ```
//!
//! Each variant gets a snake_case constructor taking `impl Into<String>`.

macro_rules! define_port_error {
    (
        $(#[$outer:meta])*
        pub enum $name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident { $field:ident : String } => $message:literal
            ),+ $(,)?
        }
    ) => {
        $(#[$outer])*
        #[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
        pub enum $name {
            $(
                $(#[$variant_meta])*
                #[error($message)]
                $variant { $field: String },
            )+
        }

        ::paste::paste! {
            impl $name {
                $(
                    pub fn [<$variant:snake>]($field: impl Into<String>) -> Self {
                        Self::$variant { $field: $field.into() }
                    }
                )+
            }
        }
    };
}

pub(crate) use define_port_error;
