//! Security module - roles, permissions and validation

pub mod permission;
pub mod role;
pub mod validator;

pub use permission::*;
pub use role::Role;
pub use validator::*;
