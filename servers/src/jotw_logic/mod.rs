pub mod config;
pub mod logger;
pub mod routes;
pub mod state;
