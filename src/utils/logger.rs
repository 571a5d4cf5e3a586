use env_logger::{Builder, Env};
use log::LevelFilter;
use std::io::Write;

pub fn init_logger() {
    // Base filter, overridable through RUST_LOG
    let env = Env::default().filter_or("RUST_LOG", "warn,ordlyd=info");

    let mut builder = Builder::from_env(env);

    builder
        // Suppress per-request noise from the HTTP stack unless asked for
        .filter_module("hyper", LevelFilter::Error)
        .filter_module("reqwest", LevelFilter::Warn)
        .filter_module("rustls", LevelFilter::Warn)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] {}: {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .target(env_logger::Target::Stderr)
        .init();
}
