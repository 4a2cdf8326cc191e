//! `define_port_error!` declares a port error enum with a snake_case
//! constructor per variant.
//!
//! Field constructors take `impl Into<T>` so adapters can pass `&str` or
//! `String` without ceremony.

macro_rules! define_port_error {
    (@ctor $variant:ident) => {
        ::paste::paste! {
            pub fn [<$variant:snake>]() -> Self {
                Self::$variant
            }
        }
    };

    (@ctor $variant:ident { $($field:ident : $ty:ty),* $(,)? }) => {
        ::paste::paste! {
            pub fn [<$variant:snake>]($($field: impl Into<$ty>),*) -> Self {
                Self::$variant { $($field: $field.into()),* }
            }
        }
    };

    (
        $(#[$outer:meta])*
        pub enum $name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident $( { $($field:ident : $ty:ty),* $(,)? } )? => $message:expr
            ),* $(,)?
        }
    ) => {
        $(#[$outer])*
        #[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
        pub enum $name {
            $(
                $(#[$variant_meta])*
                #[error($message)]
                $variant $( { $($field : $ty),* } )?,
            )*
        }

        impl $name {
            $(
                define_port_error!(@ctor $variant $( { $($field : $ty),* } )?);
            )*
        }
    };
}

pub(crate) use define_port_error;

#[cfg(test)]
mod tests {
    define_port_error! {
        pub enum LedgerProbeError {
            Offline => "ledger offline",
            Connection { message: String } => "connection failed: {message}",
            Shortfall { balance: u32, requested: u32 } =>
                "balance {balance} below {requested}",
        }
    }

    #[test]
    fn unit_variant_constructor() {
        assert_eq!(LedgerProbeError::offline().to_string(), "ledger offline");
    }

    #[test]
    fn string_field_accepts_str() {
        let err = LedgerProbeError::connection("refused");
        assert_eq!(err, LedgerProbeError::Connection { message: "refused".into() });
    }

    #[test]
    fn numeric_fields_keep_their_types() {
        let err = LedgerProbeError::shortfall(100_u32, 150_u32);
        assert_eq!(err.to_string(), "balance 100 below 150");
    }
}
