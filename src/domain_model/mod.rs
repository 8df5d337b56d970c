mod connection;
mod cursor;
mod notification;
mod token;
mod user;

pub use connection::*;
pub use cursor::*;
pub use notification::*;
pub use token::*;
pub use user::*;
