pub mod helpers;
mod minor_units;
mod secret;

pub use minor_units::{AmountConversionError, MinorUnits, DEFAULT_CURRENCY_CODE};
pub use secret::Secret;
