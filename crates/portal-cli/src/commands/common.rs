use portal_core::prefs::PreferenceStore;
use portal_core::remote::RemoteCollection;
use portal_core::{
    AppConfig, Grievance, GrievanceCard, GrievanceId, ListView, Notification, NotificationLevel,
    PortalCode, PortalSession, PortalView, Screen,
};

use crate::error::CliError;

const SHORT_ID_LEN: usize = 8;

/// Sign in and re-enter the saved portal, if any.
///
/// A saved portal that cannot be reopened is reported on stderr and the
/// session stays usable on the entry screen.
pub async fn start_session<R, P>(
    remote: R,
    prefs: P,
    config: AppConfig,
) -> Result<PortalSession<R, P>, CliError>
where
    R: RemoteCollection,
    P: PreferenceStore,
{
    let mut session = PortalSession::new(remote, prefs, config);
    session.initialize().await?;
    for notification in session.take_notifications() {
        if matches!(
            notification.level,
            NotificationLevel::Warning | NotificationLevel::Error
        ) {
            eprintln!("{}", format_notification(&notification));
        }
    }
    if session.screen() != Screen::Active {
        if let Some(saved) = session.saved_portal() {
            eprintln!("Saved portal {saved} is unavailable. Run `portal switch` to forget it.");
        }
    }
    Ok(session)
}

/// The active portal, or an error telling the user how to enter one.
pub fn require_portal<R, P>(session: &PortalSession<R, P>) -> Result<PortalCode, CliError>
where
    R: RemoteCollection,
    P: PreferenceStore,
{
    match (session.screen(), session.portal()) {
        (Screen::Active, Some(portal)) => Ok(portal.clone()),
        _ => Err(CliError::NoActivePortal),
    }
}

/// Pump the feed until the first snapshot has been applied.
pub async fn wait_for_snapshot<R, P>(session: &mut PortalSession<R, P>) -> Result<(), CliError>
where
    R: RemoteCollection,
    P: PreferenceStore,
{
    while session.snapshot().is_none() {
        if !session.has_live_subscription() {
            let reason = session
                .take_notifications()
                .pop()
                .map_or_else(|| "connection lost".to_string(), |note| note.message);
            return Err(CliError::FeedEnded(reason));
        }
        session.pump().await;
    }
    Ok(())
}

/// Print success and info notifications; failures are reported as errors.
pub fn print_successes<R, P>(session: &mut PortalSession<R, P>)
where
    R: RemoteCollection,
    P: PreferenceStore,
{
    for notification in session.take_notifications() {
        if matches!(
            notification.level,
            NotificationLevel::Success | NotificationLevel::Info
        ) {
            eprintln!("{}", notification.message);
        }
    }
}

pub fn format_notification(notification: &Notification) -> String {
    match notification.level {
        NotificationLevel::Success | NotificationLevel::Info => notification.message.clone(),
        NotificationLevel::Warning => format!("warning: {}", notification.message),
        NotificationLevel::Error => format!("error: {}", notification.message),
    }
}

/// Resolve a full ID or unique ID prefix against the latest snapshot.
pub fn resolve_grievance_id(items: &[Grievance], query: &str) -> Result<GrievanceId, CliError> {
    let query = query.trim();
    if query.is_empty() {
        return Err(CliError::EmptyGrievanceId);
    }

    if let Some(item) = items.iter().find(|item| item.id.as_str() == query) {
        return Ok(item.id.clone());
    }

    let matches = items
        .iter()
        .filter(|item| item.id.as_str().starts_with(query))
        .collect::<Vec<_>>();
    match matches.as_slice() {
        [] => Err(CliError::GrievanceNotFound(query.to_string())),
        [item] => Ok(item.id.clone()),
        _ => {
            let options = matches
                .iter()
                .take(3)
                .map(|item| short_id(&item.id))
                .collect::<Vec<_>>()
                .join(", ");
            Err(CliError::AmbiguousGrievanceId(format!(
                "ID prefix '{query}' is ambiguous; matches: {options}"
            )))
        }
    }
}

pub fn short_id(id: &GrievanceId) -> String {
    id.as_str().chars().take(SHORT_ID_LEN).collect()
}

pub fn format_card_lines(cards: &[GrievanceCard]) -> Vec<String> {
    cards
        .iter()
        .flat_map(|card| {
            [
                format!(
                    "{}  {:<11}  {}  ({})",
                    short_id(&card.id),
                    card.status_label,
                    card.title,
                    card.created_label
                ),
                format!("    {}", card.description),
            ]
        })
        .collect()
}

/// Text rendering of the current view.
pub fn render_view(view: &PortalView) -> Vec<String> {
    match view {
        PortalView::Loading => vec!["Connecting...".to_string()],
        PortalView::Entry => {
            vec!["No portal entered. Run `portal open <CODE>` or `portal open --new`.".to_string()]
        }
        PortalView::Main(main) => {
            let mut lines = vec![format!(
                "Portal {}  |  filter: {}",
                main.portal_code, main.filter
            )];
            match &main.list {
                ListView::Loading => lines.push("Loading grievances...".to_string()),
                ListView::Empty => lines.push("No grievances yet.".to_string()),
                ListView::Items(cards) => lines.extend(format_card_lines(cards)),
            }
            lines
        }
    }
}
