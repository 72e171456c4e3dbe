pub mod bookmark;
pub mod comment;
pub mod paper;
pub mod vote;
