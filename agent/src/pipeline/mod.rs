pub mod aggregate;
pub mod dispatch;
pub mod extract;
pub mod prompt;
pub mod retry;
pub mod validate;

pub use dispatch::{DispatchMode, Dispatcher};
