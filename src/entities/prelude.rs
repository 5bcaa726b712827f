pub use super::settings::Entity as Settings;
pub use super::tracks::Entity as Tracks;
pub use super::users::Entity as Users;
