use std::io::{self, BufRead, Write};

use portal_core::prefs::PreferenceStore;
use portal_core::remote::RemoteCollection;
use portal_core::session::SWITCH_PORTAL_PROMPT;
use portal_core::PortalSession;

use crate::commands::common::require_portal;
use crate::error::CliError;

pub fn run_switch<R, P>(
    session: &mut PortalSession<R, P>,
    confirm: impl FnOnce(&str) -> bool,
) -> Result<(), CliError>
where
    R: RemoteCollection,
    P: PreferenceStore,
{
    let current = match require_portal(session) {
        Ok(current) => current,
        Err(error) => {
            // a saved portal that failed to reopen can still be forgotten
            let saved = session.saved_portal().ok_or(error)?;
            if confirm(SWITCH_PORTAL_PROMPT) {
                session.forget_saved_portal();
                println!("Forgot portal {saved}");
            } else {
                println!("Keeping portal {saved}");
            }
            return Ok(());
        }
    };
    if session.switch_portal(confirm) {
        println!("Left portal {current}");
    } else {
        println!("Staying in portal {current}");
    }
    Ok(())
}

/// Ask a yes/no question on stderr and read the answer from stdin.
pub fn confirm_on_stdin(prompt: &str) -> bool {
    eprint!("{prompt} [y/N] ");
    if io::stderr().flush().is_err() {
        return false;
    }

    let mut answer = String::new();
    if io::stdin().lock().read_line(&mut answer).is_err() {
        return false;
    }
    is_affirmative(&answer)
}

pub fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
