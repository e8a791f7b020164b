pub mod admin;
pub mod files;
pub mod health;
pub mod media;
pub mod upload;

mod response;
