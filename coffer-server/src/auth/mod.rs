//! Authentication: password hashing, bearer tokens and the request gate.

mod middleware;
mod password;
mod token;

pub use middleware::{require_auth, AuthUser};
pub use password::{
    hash_password, hash_password_blocking, reject_unknown_user_blocking, verify_password,
    verify_password_blocking,
};
pub use token::{Claims, TokenAuthority};
