pub mod alarm;
pub mod destination;
pub mod position_sample;
pub mod proximity;
pub mod store;
