pub mod rest;
pub mod sse;
