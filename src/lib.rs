//! Library side of the `opti` CLI: local Azure SQL Edge containers, `.bacpac`
//! import/export and connection string wiring for .NET projects.

pub mod appsettings;
pub mod commands;
pub mod config;
pub mod connection;
pub mod context;
pub mod docker;
pub mod error;
pub mod files;
pub mod ports;
pub mod prereq;
pub mod printer;
pub mod process;
pub mod project;
pub mod prompt;
pub mod snapshot;
