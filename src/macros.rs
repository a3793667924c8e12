/// Like `log::info!`, optionally prefixed with a start time.
/// If a start time is passed the elapsed run time is appended to the message.
/// ```ignore
/// info_time!("str {}, {}", 1, 2);
/// let time = Local::now();
/// info_time!(time, "str {}, {}", 1, 2);
/// ```
#[macro_export]
macro_rules! info_time {
    ($strfm:literal $(,)? $($arg:expr),*) => {{
        log::info!($strfm, $($arg),*);
    }};
    ($time:expr, $strfm:literal $(,)? $($arg:expr),*) => {{
        let run_time = (chrono::Local::now() - $time)
                .num_microseconds()
                .map(|n| n as f64 / 1_000_000.0)
                .unwrap_or(0.0);
        log::info!("{} (took {:.3} sec)", format!($strfm, $($arg),*), run_time);
    }};
}
