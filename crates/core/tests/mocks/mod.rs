pub mod language_model;
pub mod video_source;
