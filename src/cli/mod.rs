pub mod context;
pub mod doctor;
pub mod install;
pub mod output_format;
pub mod output_types;
pub mod plan;
pub mod verify;
