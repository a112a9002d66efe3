pub mod drive;
pub mod oauth;
