pub mod common;

mod config_validation;
mod http_transport;
mod token_single_flight;
