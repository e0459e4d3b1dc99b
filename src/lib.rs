pub mod api;
pub mod datetime;
pub mod db;
pub mod gamification;
pub mod logstore;
pub mod source;
pub mod vision;
