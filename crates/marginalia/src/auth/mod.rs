//! Request authentication

pub mod role_gate;

pub use role_gate::{role_middleware, HeaderRoleGate, RoleResolver, HEADER_USER_ROLE};
