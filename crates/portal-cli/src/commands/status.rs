use portal_core::prefs::PreferenceStore;
use portal_core::remote::RemoteCollection;
use portal_core::{GrievanceStatus, PortalSession};

use crate::commands::common::{
    print_successes, require_portal, resolve_grievance_id, short_id, wait_for_snapshot,
};
use crate::error::CliError;

pub async fn run_status<R, P>(
    session: &mut PortalSession<R, P>,
    id_query: &str,
    status: GrievanceStatus,
) -> Result<(), CliError>
where
    R: RemoteCollection,
    P: PreferenceStore,
{
    require_portal(session)?;
    wait_for_snapshot(session).await?;
    let id = resolve_grievance_id(session.snapshot().unwrap_or_default(), id_query)?;

    session.change_item_status(&id, status).await?;
    print_successes(session);

    println!("{} -> {}", short_id(&id), status.label());
    Ok(())
}
