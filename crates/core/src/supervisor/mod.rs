pub mod control_loop;
pub mod session_logger;
pub mod takeover_supervisor;
