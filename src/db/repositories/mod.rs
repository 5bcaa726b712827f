pub mod setting;
pub mod track;
pub mod user;
