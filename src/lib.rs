// Library for tests to access modules

pub mod aggregation;
pub mod buffer;
pub mod collector;
pub mod config;
pub mod error;
pub mod models;
pub mod net_repo;
pub mod procfs_repo;
pub mod routes;
pub mod session;
pub mod version;
pub mod worker;
