pub mod override_event;
pub mod takeover_process;
