pub mod dev;
pub mod inspect;
