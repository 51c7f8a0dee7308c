//! Public HTTP API.

pub mod hello;
