pub mod health;
pub use self::health::health;

pub mod security;
pub use self::security::security;
