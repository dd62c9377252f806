pub mod amender;
pub mod config;
pub mod entity;
pub mod hooks;
pub mod ids;
pub mod lookup;
pub mod sidebar;
