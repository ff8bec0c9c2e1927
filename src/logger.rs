use std::fs::File;

use anyhow::{bail, Context};
use time::{
    format_description::{self, parse},
    OffsetDateTime,
};
use tracing::{
    dispatcher,
    subscriber::{set_global_default, NoSubscriber},
    Level,
};
use tracing_subscriber::{fmt::writer::BoxMakeWriter, FmtSubscriber};

/// Sends every `tracing` event to a time-stamped file in the current directory.
pub fn init_logger() -> anyhow::Result<()> {
    if dispatcher::get_default(|current| !current.is::<NoSubscriber>()) {
        bail!(ALREADY_SET);
    }

    let file_name = get_log_file_name()?;
    let file = File::create(&file_name).with_context(|| format!("cannot create {file_name}"))?;
    let writer = BoxMakeWriter::new(file);
    let local_offset = time::UtcOffset::current_local_offset().unwrap_or(time::UtcOffset::UTC);
    let timer = tracing_subscriber::fmt::time::OffsetTime::new(
        local_offset,
        format_description::parse("[year]-[month]-[day] [hour]:[minute]:[second]")?,
    );

    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::TRACE)
        .with_ansi(false)
        .with_timer(timer)
        .with_writer(writer)
        .finish();

    set_global_default(subscriber).context(ALREADY_SET)
}

const ALREADY_SET: &str = "a global tracing subscriber is already set, consider disabling logs";

fn get_log_file_name() -> anyhow::Result<String> {
    let format = parse("[year]-[month]-[day]_[hour]:[minute]:[second]_dojo_log.txt")?;
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    Ok(now.format(&format)?)
}
