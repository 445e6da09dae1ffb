pub mod application;
pub mod job;
pub mod notification;
pub mod project;
pub mod student_profile;
pub mod user;
