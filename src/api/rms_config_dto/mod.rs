pub mod rms_dto;
