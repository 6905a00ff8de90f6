pub mod db;
pub mod words;
