pub mod karma;
pub mod team;
