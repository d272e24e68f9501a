mod account;
mod notification;
mod plan;
mod subscription;

pub use account::*;
pub use notification::*;
pub use plan::*;
pub use subscription::*;
