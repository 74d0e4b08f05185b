pub mod error;
pub mod records;
pub mod settings;
pub mod traits;

pub mod prelude {
    pub use super::error::*;
    pub use super::records::*;
    pub use super::settings::*;
    pub use super::traits::*;
}
