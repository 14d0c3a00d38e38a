pub mod config;
pub mod error;
pub mod evaluation;
pub mod incident;
pub mod record;
pub mod traits;

pub use config::Config;
pub use error::*;
pub use evaluation::*;
pub use incident::*;
pub use record::*;
