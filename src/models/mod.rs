pub mod card;
pub mod library;
pub mod pack;

pub use card::*;
pub use library::*;
pub use pack::*;
