pub mod token;
pub mod user;

pub use token::{CreateTokenRequest, CreatedToken, PersonalAccessToken, TokenView};
pub use user::{NewUser, RoleUpdate, StatusUpdate, User};
