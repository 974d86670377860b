pub mod distance_model;
pub mod person_detector;
