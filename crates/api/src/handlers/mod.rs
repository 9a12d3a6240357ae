pub mod broadcast;
pub mod event;
