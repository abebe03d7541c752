pub mod db;
pub mod init;
pub mod watch;
