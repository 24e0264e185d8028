#![allow(dead_code)]

pub mod completion_client;
pub mod datastore;
pub mod transcript_source;
