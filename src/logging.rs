use std::io::Write;

use colored::Colorize;
use env_logger::Builder;
use log::{Level, LevelFilter};

/// Log to stderr so generated messages on stdout stay pipeable.
pub fn init_logger(verbosity: u8) {
    let level = match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    let mut builder = Builder::new();
    builder.filter_level(level);
    // Dependencies are only interesting at trace level.
    if level < LevelFilter::Trace {
        builder.filter_module("reqwest", LevelFilter::Warn);
    }
    builder.parse_env("MERGEBOT_LOG");

    builder.format(move |buf, record| {
        let level_label = match record.level() {
            Level::Error => "ERROR".red().bold(),
            Level::Warn => "WARN ".yellow().bold(),
            Level::Info => "INFO ".white().bold(),
            Level::Debug => "DEBUG".bright_black(),
            Level::Trace => "TRACE".bright_black(),
        };

        if level >= LevelFilter::Debug {
            writeln!(
                buf,
                "{} {} {}",
                level_label,
                record.target().bright_black(),
                record.args()
            )
        } else {
            writeln!(buf, "{} {}", level_label, record.args())
        }
    });

    builder.init();
}
