pub mod deal;
pub mod preferences;
pub mod suggestion;
