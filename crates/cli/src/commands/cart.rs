//! Cart commands. All of them act on the signed-in user's cart.

use rust_decimal::Decimal;
use tracing::info;

use bukka_core::{ItemId, Price};
use bukka_storefront::cart::{CheckoutOutcome, LineRequest};
use bukka_storefront::error::AppError;
use bukka_storefront::models::CartLine;
use bukka_storefront::platform::AuthUser;
use bukka_storefront::state::AppState;

use super::CliError;

fn item_id(raw: &str) -> Result<ItemId, CliError> {
    ItemId::parse(raw).map_err(|e| CliError::InvalidId(format!("{raw}: {e}")))
}

fn log_lines(state: &AppState, lines: &[CartLine]) {
    if lines.is_empty() {
        info!("Your cart is empty");
        return;
    }
    let currency = state.settings().currency;
    for line in lines {
        info!(
            "{:>3} × {:<24} {:<10} {}",
            line.quantity,
            line.name,
            line.variant,
            Price::new(line.subtotal(), currency).display()
        );
        if let Some(instructions) = &line.instructions {
            info!("        note: {instructions}");
        }
    }
}

/// Show the cart.
///
/// # Errors
///
/// Returns an error if the cart can't be read.
pub async fn show(state: &AppState, user: &AuthUser) -> Result<(), CliError> {
    let lines = state.cart().lines(&user.id).await?;
    log_lines(state, &lines);

    let summary = state.cart().summary(&user.id).await?;
    info!(
        "{} items in {} lines, total {}",
        summary.items,
        summary.lines,
        summary.total.display()
    );
    Ok(())
}

/// Add an item.
///
/// # Errors
///
/// Returns an error if the item doesn't exist, is rejected, or the write fails.
pub async fn add(
    state: &AppState,
    user: &AuthUser,
    raw_id: &str,
    variant: &str,
    price: Option<Decimal>,
    instructions: Option<&str>,
) -> Result<(), CliError> {
    let id = item_id(raw_id)?;
    let item = state
        .catalog()
        .find_item(&id)
        .await
        .map_err(|e| AppError::from(e).report())?
        .ok_or_else(|| AppError::NotFound(format!("menu item {id}")))?;

    let request = LineRequest {
        unit_price: price.or(Some(item.price.amount)),
        instructions,
        ..LineRequest::listed(&item, variant)
    };
    let change = state
        .cart()
        .add_or_merge_line(Some(&user.id), request)
        .await?;
    info!(item = %item.name, change = ?change, "Cart updated");
    Ok(())
}

/// Remove an item.
///
/// # Errors
///
/// Returns an error if the delete fails.
pub async fn remove(state: &AppState, user: &AuthUser, raw_id: &str) -> Result<(), CliError> {
    let id = item_id(raw_id)?;
    state.cart().remove_line(Some(&user.id), &id).await?;
    info!(item_id = %id, "Removed from cart");
    Ok(())
}

/// Clear the cart.
///
/// # Errors
///
/// Returns an error if the cart is empty or some lines couldn't be removed.
pub async fn checkout(state: &AppState, user: &AuthUser) -> Result<(), CliError> {
    let context = state.cart().checkout_context(&user.id);
    match state.cart().checkout(Some(&user.id), &context).await? {
        CheckoutOutcome::Completed(receipt) => info!(
            "Checked out {} lines, total {}",
            receipt.cleared,
            receipt.total.display()
        ),
        CheckoutOutcome::AlreadyCheckedOut => info!("Already checked out"),
    }
    context.close();
    Ok(())
}

/// Follow the cart until Ctrl+C.
///
/// # Errors
///
/// Returns an error if the interrupt handler can't be installed.
pub async fn watch(state: &AppState) -> Result<(), CliError> {
    let mut live = state.cart().live_cart();
    info!("Watching cart, press Ctrl+C to stop");

    loop {
        tokio::select! {
            update = live.next() => match update {
                Some(lines) => {
                    info!("--- cart updated ---");
                    log_lines(state, &lines);
                }
                None => break,
            },
            signal = tokio::signal::ctrl_c() => {
                signal?;
                break;
            }
        }
    }
    live.cancel();
    Ok(())
}
