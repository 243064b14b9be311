pub mod config_dto;
pub mod rms_config_dto;
