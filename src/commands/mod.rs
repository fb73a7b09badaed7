pub mod audio;
pub mod clean;
pub mod export;
