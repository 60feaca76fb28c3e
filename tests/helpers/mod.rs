#![allow(dead_code)]

pub mod builders;
pub mod db;

pub use builders::DirectoryBuilder;
pub use db::TestDb;
