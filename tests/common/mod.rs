#![allow(dead_code)]

pub mod given;
