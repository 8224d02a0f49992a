//! Dual logger setup for the CLI binary (spec §4.14), grounded on the
//! teacher's `lib.rs::init()`: a colored terminal logger at info level plus
//! a debug-level file logger under a timestamped `logs/` file.

/// Initialize the process-wide logger. Call once, from `main`.
#[cfg(feature = "cli")]
pub fn init() {
    use simplelog::{ColorChoice, CombinedLogger, ConfigBuilder, TermLogger, TerminalMode, WriteLogger};

    std::fs::create_dir_all("logs").expect("create logs directory");
    let config = ConfigBuilder::new()
        .set_location_level(log::LevelFilter::Off)
        .set_target_level(log::LevelFilter::Off)
        .set_thread_level(log::LevelFilter::Off)
        .build();
    let time = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("time moves forward")
        .as_secs();
    let file = WriteLogger::new(
        log::LevelFilter::Debug,
        config.clone(),
        std::fs::File::create(format!("logs/{time}.log")).expect("create log file"),
    );
    let term = TermLogger::new(
        log::LevelFilter::Info,
        config,
        TerminalMode::Mixed,
        ColorChoice::Auto,
    );
    CombinedLogger::init(vec![term, file]).expect("initialize logger");
}

/// Test/library-only initializer: a plain `env_logger`, safe to call from
/// every test since `try_init` tolerates repeated calls.
#[cfg(all(test, feature = "cli"))]
pub fn init_for_tests() {
    let _ = env_logger::builder().is_test(true).try_init();
}
