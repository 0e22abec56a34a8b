//! Integration tests for the collaboration sync engine, run over the
//! in-memory backend.

mod helpers;

mod chat_test;
mod notification_test;
mod presence_test;
mod reconnect_test;
mod registration_test;
