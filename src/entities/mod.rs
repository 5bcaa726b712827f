pub mod prelude;

pub mod settings;
pub mod tracks;
pub mod users;
