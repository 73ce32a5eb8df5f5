mod request;
mod token;
mod user;

pub use request::{non_empty, normalize_email, Credentials, Registration, Session};
pub use token::{auth_cookie, AuthToken, AUTH_TOKEN_COOKIE};
pub use user::{AnyUser, Audience, Citizen, Official, Rights};
