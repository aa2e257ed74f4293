use std::panic;
use std::process::ExitCode;

use clap::Parser;

use talkterm::app::App;
use talkterm::config::{AppConfig, Prefs};
use talkterm::{init_logging, init_tracing, log_panic};

fn main() -> ExitCode {
    let config = AppConfig::parse();
    init_logging(&config);
    init_tracing(&config);

    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        log_panic(info);
        default_hook(info);
    }));

    let prefs_path = config.prefs_path();
    let (prefs, warning) = match Prefs::load(&prefs_path) {
        Ok(loaded) => loaded,
        Err(err) => {
            eprintln!("\n{err}");
            return ExitCode::FAILURE;
        }
    };

    let mut app = match App::new(prefs, prefs_path, warning) {
        Ok(app) => app,
        Err(err) => {
            eprintln!("{err:#}");
            return ExitCode::FAILURE;
        }
    };
    match app.run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err:#}");
            ExitCode::FAILURE
        }
    }
}
