//! Domain entities - the core business objects.

mod account;
mod post;
mod profile;
mod session;

pub use account::{Account, OAUTH_HANDLE_KEY, SIGN_UP_USERNAME_KEY};
pub use post::{NewPost, Post, PostChanges};
pub use profile::{NewProfile, Profile};
pub use session::{AuthSession, Session};
