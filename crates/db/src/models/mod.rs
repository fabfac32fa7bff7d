pub mod attachment;
pub mod comment;
pub mod ids;
pub mod project;
pub mod project_member;
pub mod ticket;
pub mod user;
