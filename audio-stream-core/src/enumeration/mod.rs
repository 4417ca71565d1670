pub mod connection;
pub mod enumerator;
