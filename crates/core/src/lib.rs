pub mod capture;
pub mod detection;
pub mod presence;
pub mod shared;
pub mod supervisor;
pub mod takeover;
