pub mod aggregator;
pub mod connectivity;
pub mod dispatch;
pub mod indicator;
pub mod plugins;
pub mod reading;
pub mod scheduler;
pub mod service;
