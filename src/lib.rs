pub mod convert;
pub mod duration;
pub mod error;
pub mod midi;
pub mod mml;
pub mod note;
pub mod options;

pub use convert::Converter;
pub use error::{Diagnostic, Error};
pub use options::ConvertOptions;
