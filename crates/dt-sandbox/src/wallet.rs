//! The race-safe wallet popup protocol (spec.md §4.2 "Wallet interaction
//! contract"). Never raises: every attempt collapses to *handled or not*.

use std::time::Duration;

use crate::traits::{Context, Wallet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalletOutcome {
    Handled,
    NotHandled,
}

async fn find_notification_tab(context: &dyn Context) -> Option<crate::traits::TabInfo> {
    context
        .tabs()
        .await
        .ok()?
        .into_iter()
        .find(|t| t.is_extension)
}

async fn invoke_helper(wallet: &dyn Wallet, action: &str) -> bool {
    let result = match action {
        "approve" => wallet.approve().await,
        "sign" => wallet.sign().await,
        "confirm_transaction" => wallet.confirm_transaction().await,
        "reject" => wallet.reject().await,
        "handle_siwe_popup" => wallet.handle_siwe_popup().await,
        other if other.starts_with("switch_network:") => {
            wallet.switch_network(&other["switch_network:".len()..]).await
        }
        other if other.starts_with("add_network:") => {
            wallet.add_network(&other["add_network:".len()..]).await
        }
        _ => Ok(false),
    };
    result.unwrap_or(false)
}

/// Steps 1–3 of the race-safe protocol for a single wallet action.
pub async fn drive(wallet: &dyn Wallet, context: &dyn Context, action: &str) -> WalletOutcome {
    if let Some(tab) = find_notification_tab(context).await {
        let _ = context.bring_forward(&tab.id).await;
        if wallet.drive_popup(&tab, action).await.unwrap_or(false) {
            return WalletOutcome::Handled;
        }
    }

    if let Ok(true) = tokio::time::timeout(Duration::from_secs(2), invoke_helper(wallet, action))
        .await
        .unwrap_or(Ok(false))
    {
        return WalletOutcome::Handled;
    }

    if let Ok(tab) = wallet.open_notification().await {
        if wallet.drive_popup(&tab, action).await.unwrap_or(false) {
            return WalletOutcome::Handled;
        }
    }

    WalletOutcome::NotHandled
}

/// Step 4: after a handled action expected to trigger a dependent popup
/// (e.g. sign-in-with-Ethereum after connection), poll up to 3× at 2 s
/// intervals before repeating steps 1–3 for `dependent_action`.
pub async fn drive_with_dependent_popup(
    wallet: &dyn Wallet,
    context: &dyn Context,
    action: &str,
    dependent_action: &str,
) -> WalletOutcome {
    let first = drive(wallet, context, action).await;
    if first != WalletOutcome::Handled {
        return first;
    }

    for _ in 0..3 {
        tokio::time::sleep(Duration::from_secs(2)).await;
        if find_notification_tab(context).await.is_some() {
            return drive(wallet, context, dependent_action).await;
        }
    }
    // the dependent popup never materialized; the primary action still succeeded
    WalletOutcome::Handled
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::{FakeBrowser, FakeBrowserConfig};

    #[tokio::test]
    async fn drives_already_open_notification() {
        let browser = FakeBrowser::new(FakeBrowserConfig {
            notification_open_on_start: true,
            ..Default::default()
        });
        let outcome = drive(&browser, &browser, "approve").await;
        assert_eq!(outcome, WalletOutcome::Handled);
    }

    #[tokio::test]
    async fn falls_back_to_manual_notification_open() {
        let browser = FakeBrowser::new(FakeBrowserConfig {
            notification_open_on_start: false,
            helper_responds: false,
            ..Default::default()
        });
        let outcome = drive(&browser, &browser, "approve").await;
        assert_eq!(outcome, WalletOutcome::Handled);
    }

    #[tokio::test]
    async fn never_errors_when_nothing_handles_it() {
        let browser = FakeBrowser::new(FakeBrowserConfig {
            notification_open_on_start: false,
            helper_responds: false,
            notification_drivable: false,
            ..Default::default()
        });
        let outcome = drive(&browser, &browser, "approve").await;
        assert_eq!(outcome, WalletOutcome::NotHandled);
    }
}
