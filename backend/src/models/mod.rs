pub mod health;
pub mod insights;
pub mod macros;
pub mod relief;

pub use health::*;
pub use insights::*;
pub use relief::*;
