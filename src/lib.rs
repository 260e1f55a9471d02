mod app;
mod application;
mod domain;
mod infrastructure;
mod interfaces;

#[cfg(test)]
mod test_support;

pub use app::run;
