//! 领域模型

mod approval;
mod card;
mod directory;
mod enums;
mod notification;

pub use approval::*;
pub use card::*;
pub use directory::*;
pub use enums::*;
pub use notification::*;
