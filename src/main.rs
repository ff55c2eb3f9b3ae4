mod app;
mod gui;
mod io;
mod states;
mod tree;
mod ui;

use app::{AppConfig, DemeGraphApp};
use clap::Parser;

fn main() {
    let _ = env_logger::builder().format_timestamp(None).try_init();

    let config = AppConfig::parse();
    if let Err(err) = DemeGraphApp::run(&config) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
