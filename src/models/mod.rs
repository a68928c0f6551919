// src/models/mod.rs

pub mod feedback;
pub mod level;
pub mod question;
pub mod section;
