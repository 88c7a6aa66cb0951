pub mod config;
pub mod derive;
pub mod fetch;
pub mod logging;
pub mod pipeline;
pub mod records;
pub mod store;
pub mod validate;
