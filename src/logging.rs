use log::LevelFilter;
use std::io::Write;

const LEVELS: [LevelFilter; 6] = [
    LevelFilter::Trace,
    LevelFilter::Debug,
    LevelFilter::Info,
    LevelFilter::Warn,
    LevelFilter::Error,
    LevelFilter::Off,
];

/// Level after `verbose` steps up and `quiet` steps down from `info`.
pub fn level_from_counts(verbose: u8, quiet: u8) -> LevelFilter {
    let index = 2 + i32::from(quiet) - i32::from(verbose);
    LEVELS[index.clamp(0, LEVELS.len() as i32 - 1) as usize]
}

/// Install the global logger. `RUST_LOG` can still refine the level.
pub fn init_logger(level: LevelFilter) {
    let crate_name = env!("CARGO_PKG_NAME").replace('-', "_");

    env_logger::builder()
        .filter_level(level)
        .parse_default_env()
        .format(move |f, rec| {
            let now = humantime::format_rfc3339_millis(std::time::SystemTime::now());
            let module = rec.module_path().unwrap_or("<unknown>");
            let line = rec.line().unwrap_or(u32::MIN);

            writeln!(
                f,
                "[{} {} {} {}:{}] {}",
                rec.level(),
                crate_name,
                now,
                module,
                line,
                rec.args()
            )
        })
        .init();
}
