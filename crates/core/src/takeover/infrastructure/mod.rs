pub mod command_takeover;
pub mod file_flag_override;
pub mod media_playlist;
