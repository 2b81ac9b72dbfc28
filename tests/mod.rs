mod common;

mod kv_tests;
mod message_tests;
mod retry_tests;
