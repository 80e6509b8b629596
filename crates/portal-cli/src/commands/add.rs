use portal_core::prefs::PreferenceStore;
use portal_core::remote::RemoteCollection;
use portal_core::PortalSession;

use crate::commands::common::{print_successes, require_portal};
use crate::error::CliError;

pub async fn run_add<R, P>(
    session: &mut PortalSession<R, P>,
    title: &str,
    description_parts: &[String],
) -> Result<(), CliError>
where
    R: RemoteCollection,
    P: PreferenceStore,
{
    require_portal(session)?;
    let id = session
        .submit_item(title, description_parts.join(" "))
        .await?;
    print_successes(session);

    println!("{id}");
    Ok(())
}
