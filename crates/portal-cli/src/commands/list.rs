use portal_core::prefs::PreferenceStore;
use portal_core::remote::RemoteCollection;
use portal_core::util::unix_millis_now;
use portal_core::{GrievanceCard, PortalSession, PortalView, StatusFilter};

use crate::commands::common::{render_view, require_portal, wait_for_snapshot};
use crate::error::CliError;

pub async fn run_list<R, P>(
    session: &mut PortalSession<R, P>,
    filter: StatusFilter,
    as_json: bool,
) -> Result<(), CliError>
where
    R: RemoteCollection,
    P: PreferenceStore,
{
    require_portal(session)?;
    wait_for_snapshot(session).await?;
    session.set_filter(filter);
    let view = session.view(unix_millis_now());

    if as_json {
        let cards = match &view {
            PortalView::Main(main) => main.list.cards().to_vec(),
            PortalView::Loading | PortalView::Entry => Vec::new(),
        };
        println!("{}", serde_json::to_string_pretty::<Vec<GrievanceCard>>(&cards)?);
    } else {
        for line in render_view(&view) {
            println!("{line}");
        }
    }

    Ok(())
}
