pub mod presence_reading;
pub mod presence_sampler;
pub mod sampler_worker;
