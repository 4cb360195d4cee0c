//! Account commands.

use tracing::info;

use bukka_storefront::state::AppState;

use super::{CliError, Credentials, sign_in};

/// Create an account, which also signs it in.
///
/// # Errors
///
/// Returns an error if credentials are missing or registration fails.
pub async fn register(state: &AppState, credentials: &Credentials, name: &str) -> Result<(), CliError> {
    let (email, password) = credentials.require()?;
    // The CLI takes the password once, so it doubles as the confirmation.
    let user = state.auth().register(name, email, password, password).await?;
    info!(user_id = %user.id, email = %user.email, "Account created");
    Ok(())
}

/// Sign in and show who that is.
///
/// # Errors
///
/// Returns an error if credentials are missing or sign-in fails.
pub async fn whoami(state: &AppState, credentials: &Credentials) -> Result<(), CliError> {
    let user = sign_in(state, credentials).await?;
    let name = state.auth().display_name(Some(&user)).await;
    info!("{name} <{}> ({})", user.email, user.id);
    Ok(())
}
