pub mod cover;
pub mod csv_text;
pub mod error;
pub mod import;
pub mod photo;
pub mod plot;
pub mod project;
pub mod species;

#[cfg(feature = "api")]
pub mod client;
#[cfg(feature = "api")]
pub mod source;
