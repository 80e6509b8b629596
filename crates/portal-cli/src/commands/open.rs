use portal_core::prefs::PreferenceStore;
use portal_core::remote::RemoteCollection;
use portal_core::{PortalCode, PortalSession, Screen};

use crate::commands::common::print_successes;
use crate::error::CliError;

/// Enter `code`, or a freshly generated portal with `new`.
///
/// An active saved portal is left alone: entering a different one requires
/// `portal switch` first. A saved portal that failed to reopen is retried
/// when no code is given and replaced otherwise.
pub async fn run_open<R, P>(
    session: &mut PortalSession<R, P>,
    code: Option<&str>,
    new: bool,
) -> Result<(), CliError>
where
    R: RemoteCollection,
    P: PreferenceStore,
{
    if session.screen() == Screen::Active {
        if let Some(current) = session.portal().cloned() {
            let length = session.config().portal_id_length;
            let same_portal = code.is_none_or(|code| {
                PortalCode::parse(code, length).is_ok_and(|parsed| parsed == current)
            });
            if new || !same_portal {
                return Err(CliError::AlreadyInPortal(current.to_string()));
            }
            println!("{current}");
            return Ok(());
        }
    }

    let candidate = if new { None } else { Some(code.unwrap_or_default()) };
    if new || code.is_some() {
        replace_unreachable_portal(session, candidate);
    }
    let portal = session.resolve_portal(candidate)?;
    session.enter_portal(portal.clone()).await?;
    print_successes(session);

    if new {
        eprintln!("Share this code with your partner to join the portal.");
    }
    println!("{portal}");
    Ok(())
}

/// Forget a saved portal that failed to reopen when the user asks for a
/// different one, so the saved code does not win over the request.
pub fn replace_unreachable_portal<R, P>(
    session: &mut PortalSession<R, P>,
    candidate: Option<&str>,
) where
    R: RemoteCollection,
    P: PreferenceStore,
{
    if session.screen() == Screen::Active {
        return;
    }
    let Some(saved) = session.saved_portal() else {
        return;
    };
    let length = session.config().portal_id_length;
    let same_portal = candidate
        .is_some_and(|code| PortalCode::parse(code, length).is_ok_and(|code| code == saved));
    if !same_portal {
        tracing::info!("Replacing unreachable saved portal {}", saved);
        session.forget_saved_portal();
    }
}
