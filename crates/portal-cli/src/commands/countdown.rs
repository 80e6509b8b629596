use std::io::{self, Write};

use chrono::{DateTime, Local, NaiveDateTime, Utc};
use portal_core::countdown::ticks;
use portal_core::prefs::PreferenceStore;
use portal_core::{AppConfig, Countdown, CountdownState};

use crate::error::CliError;

const LOCAL_INPUT_FORMAT: &str = "%Y-%m-%dT%H:%M";

pub async fn run_countdown<P: PreferenceStore>(
    prefs: P,
    config: &AppConfig,
    set: Option<&str>,
    clear: bool,
    watch: bool,
) -> Result<(), CliError> {
    let mut countdown = Countdown::load(prefs, config);

    if let Some(raw) = set {
        let target = parse_meeting_date(raw)?;
        countdown.set_target(target);
        eprintln!("Meeting date set successfully!");
    }
    if clear {
        countdown.clear_target();
        eprintln!("Meeting date cleared.");
    }

    if let Some(target) = countdown.target() {
        println!(
            "Meeting: {}",
            target.with_timezone(&Local).format("%Y-%m-%d %H:%M")
        );
    }

    if !watch {
        println!("{}", format_countdown(countdown.state(Utc::now())));
        return Ok(());
    }

    let mut ticks = ticks();
    let mut stdout = io::stdout();
    loop {
        tokio::select! {
            _ = ticks.tick() => {
                let state = countdown.state(Utc::now());
                write!(stdout, "\r{}", format_countdown(state))?;
                stdout.flush()?;
                if !matches!(state, CountdownState::Running(_)) {
                    writeln!(stdout)?;
                    return Ok(());
                }
            }
            _ = tokio::signal::ctrl_c() => {
                writeln!(stdout)?;
                return Ok(());
            }
        }
    }
}

/// Accept RFC 3339, or `YYYY-MM-DDTHH:MM` in local time.
pub fn parse_meeting_date(raw: &str) -> Result<DateTime<Utc>, CliError> {
    let raw = raw.trim();
    if let Ok(date) = DateTime::parse_from_rfc3339(raw) {
        return Ok(date.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(raw, LOCAL_INPUT_FORMAT)
        .ok()
        .and_then(|naive| naive.and_local_timezone(Local).single())
        .map(|local| local.with_timezone(&Utc))
        .ok_or_else(|| CliError::InvalidDate(raw.to_string()))
}

pub fn format_countdown(state: CountdownState) -> String {
    match state {
        CountdownState::NotConfigured => "Set a date to start the countdown!".to_string(),
        CountdownState::Running(remaining) => format!("Time until we meet: {}", remaining.label()),
        CountdownState::Arrived => "Your meeting time has arrived!".to_string(),
    }
}
