pub mod feed;
pub mod health;
pub mod kv;
pub mod rbmq;
