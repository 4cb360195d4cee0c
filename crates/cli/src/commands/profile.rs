//! Profile commands.

use std::path::Path;

use tracing::info;

use bukka_storefront::error::AppError;
use bukka_storefront::platform::AuthUser;
use bukka_storefront::state::AppState;

use super::CliError;

/// Show the profile.
///
/// # Errors
///
/// Returns an error if the profile can't be read.
pub async fn show(state: &AppState, user: &AuthUser) -> Result<(), CliError> {
    let profile = state.profile().load_profile(user).await?;
    let name = if profile.personal.full_name.is_empty() {
        state.auth().display_name(Some(user)).await
    } else {
        profile.personal.full_name.clone()
    };

    info!("{name}");
    if let Some(email) = &profile.email {
        info!("  email:    {email}");
    }
    if !profile.personal.phone_number.is_empty() {
        info!("  phone:    {}", profile.personal.phone_number);
    }
    let address = &profile.delivery;
    if !address.street.is_empty() {
        info!("  delivery: {}, {}, {}", address.street, address.city, address.state);
    }
    info!(
        "  orders:   {:?} spice, {:?} delivery",
        profile.order.spice_level, profile.order.preferred_delivery_time
    );
    info!("  payment:  {:?}", profile.payment.method);
    if let Some(since) = profile.member_since_label() {
        info!("  member since {since}");
    }
    if let Some(url) = &profile.avatar_url {
        info!("  avatar:   {url}");
    }
    Ok(())
}

/// Show recent orders.
///
/// # Errors
///
/// Returns an error if the orders can't be read.
pub async fn orders(state: &AppState, user: &AuthUser) -> Result<(), CliError> {
    let orders = state.profile().order_history(&user.id).await?;
    if orders.is_empty() {
        info!("No orders yet");
    }
    for order in &orders {
        let placed = order
            .created_at
            .map(|t| t.format("%d %b %Y").to_string())
            .unwrap_or_default();
        let total = order.total.map(|t| t.to_string()).unwrap_or_default();
        info!(
            "{} {placed:<12} {:<18} {total:>10}  {}",
            order.reference(),
            order.status,
            order.items_label()
        );
    }
    Ok(())
}

/// Show saved addresses.
///
/// # Errors
///
/// Returns an error if the addresses can't be read.
pub async fn addresses(state: &AppState, user: &AuthUser) -> Result<(), CliError> {
    let addresses = state.profile().saved_addresses(&user.id).await?;
    if addresses.is_empty() {
        info!("No saved addresses");
    }
    for saved in &addresses {
        let marker = if saved.is_default { "*" } else { " " };
        let a = &saved.address;
        info!("{marker} {:<10} {}, {}, {}", saved.label, a.street, a.city, a.state);
    }
    Ok(())
}

/// Rate the last order.
///
/// # Errors
///
/// Returns an error if the rating is out of range or a write fails.
pub async fn rate(state: &AppState, user: &AuthUser, stars: u8) -> Result<(), CliError> {
    match state.profile().submit_rating(&user.id, stars).await? {
        Some(order) => info!(order_id = %order, stars, "Thanks for rating your order"),
        None => info!(stars, "Thanks for your rating"),
    }
    Ok(())
}

fn content_type(file: &Path) -> Option<&'static str> {
    let ext = file.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        _ => None,
    }
}

/// Upload a profile picture.
///
/// # Errors
///
/// Returns an error if the file isn't an image, can't be read, or the upload fails.
pub async fn avatar(state: &AppState, user: &AuthUser, file: &Path) -> Result<(), CliError> {
    let content_type = content_type(file).ok_or_else(|| {
        AppError::Validation("Profile pictures must be PNG, JPEG, WebP or GIF.".to_string())
    })?;
    let bytes = tokio::fs::read(file).await?;
    let url = state
        .profile()
        .upload_avatar(&user.id, bytes, content_type)
        .await?;
    info!(url = %url, "Profile picture updated");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_from_extension() {
        assert_eq!(content_type(Path::new("me.PNG")), Some("image/png"));
        assert_eq!(content_type(Path::new("me.jpeg")), Some("image/jpeg"));
        assert_eq!(content_type(Path::new("me.pdf")), None);
        assert_eq!(content_type(Path::new("me")), None);
    }
}
