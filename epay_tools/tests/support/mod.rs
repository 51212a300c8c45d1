#![allow(dead_code)]

pub mod processor;
pub mod recorder;
