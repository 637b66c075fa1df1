pub mod codec;
pub mod config;
pub mod convert;
pub mod data_types;
pub mod integrity;
pub mod schema;
pub mod table;
