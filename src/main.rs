use playwrap::cli::count_verbosity;
use playwrap::runner::ProcessRunner;
use playwrap::{main_with, AppConfig};

use env_logger::Builder;
use log::{debug, LevelFilter};
use std::io::Write;

fn main() {
    let tokens: Vec<String> = std::env::args().skip(1).collect();

    // The command tree is only known after discovery, so count -v by hand
    let log_level = match count_verbosity(&tokens) {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    let mut builder = Builder::new();
    builder
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] {} - {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .filter_level(log_level)
        .init();

    let config = AppConfig::from_env();
    debug!("Configuration: {:?}", config);

    let runner = ProcessRunner::from_config(&config);
    std::process::exit(main_with(&tokens, &config, &runner));
}
