mod config;
mod multipart;
mod outcome;
mod progress;

#[rustfmt::skip]
pub use {
    config::*,
    multipart::*,
    outcome::*,
    progress::*,
};
