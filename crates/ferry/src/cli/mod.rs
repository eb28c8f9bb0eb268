mod app;
mod delete;
mod fetch;
mod list;
mod status;

pub use app::{App, FerryEngine};
