pub mod enums;
pub mod transcript;
pub mod turn;

pub use enums::*;
pub use transcript::*;
pub use turn::*;
