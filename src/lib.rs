//! mathpad: turn math problems into scripts and run them against symbolic,
//! numerical or plain-logic backends.

pub mod backends;
pub mod cli;
pub mod config;
pub mod execution;
pub mod generation;
pub mod handlers;
pub mod llm;
pub mod printer;
pub mod role;
pub mod symbolic;
