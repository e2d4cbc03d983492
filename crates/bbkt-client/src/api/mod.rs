//! API endpoint implementations.

mod user;
mod workspaces;

pub use user::UserApi;
pub use workspaces::WorkspacesApi;
