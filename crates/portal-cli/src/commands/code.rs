use portal_core::prefs::PreferenceStore;
use portal_core::remote::RemoteCollection;
use portal_core::PortalSession;

use crate::commands::common::require_portal;
use crate::error::CliError;

pub fn run_code<R, P>(session: &PortalSession<R, P>) -> Result<(), CliError>
where
    R: RemoteCollection,
    P: PreferenceStore,
{
    println!("{}", require_portal(session)?);
    Ok(())
}
