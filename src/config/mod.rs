pub mod types;
pub mod column;
pub mod loader;
pub mod validator;
pub mod resolved;

pub use types::*;
pub use column::*;
pub use loader::*;
pub use validator::*;
pub use resolved::*;
