pub mod lock;
pub mod logger;
pub mod miw;
pub mod signal;
pub mod template;
