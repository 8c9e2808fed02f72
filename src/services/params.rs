//! Turning stored settings into validated trading parameters

use crate::db::Database;
use crate::error::BotError;
use crate::types::{BotSettings, SellRoute, TradingParameters, UserId};
use alloy::primitives::Address;
use rust_decimal::Decimal;
use std::str::FromStr;
use tracing::{info, warn};

/// Load and validate a user's settings plus the contract route they sell through
pub async fn load_parameters(
    db: &Database,
    user_id: &str,
    quote_token: Address,
    recipient: Address,
) -> Result<(TradingParameters, SellRoute), BotError> {
    let user_id = UserId::parse(user_id)?;

    let settings = db
        .get_settings_for_user(&user_id)
        .await?
        .ok_or(BotError::SettingsNotFound)?;

    let params = to_trading_parameters(&settings)?;

    if params.upper_target_price < params.lower_target_price {
        warn!(
            upper = params.upper_target_price,
            lower = params.lower_target_price,
            "Upper target is below lower target; a price between them starts and stops selling in the same tick without a sale, and a price at or above the lower target sells every tick"
        );
    }

    let route = SellRoute {
        router: params.router_address,
        token: params.token_address,
        quote_token,
        recipient,
    };

    info!(
        user_id = %params.owner,
        router = %route.router,
        token = %route.token,
        "Trading parameters loaded"
    );

    Ok((params, route))
}

/// Validate a stored record
pub fn to_trading_parameters(settings: &BotSettings) -> Result<TradingParameters, BotError> {
    let upper = positive_price("targetPrice", settings.target_price)?;
    let lower = positive_price("lowerTargetPrice", settings.lower_target_price)?;

    if settings.sell_amount_usd <= Decimal::ZERO {
        return Err(BotError::InvalidSettings(format!(
            "sellAmountUSD must be positive, got {}",
            settings.sell_amount_usd
        )));
    }

    Ok(TradingParameters {
        owner: settings.user_id,
        upper_target_price: upper,
        lower_target_price: lower,
        sell_amount_usd: settings.sell_amount_usd,
        approval_required: settings.approval_required,
        router_address: parse_address("routerAddress", settings.router_address.as_deref())?,
        token_address: parse_address("tokenAddress", settings.token_address.as_deref())?,
    })
}

fn positive_price(field: &str, value: f64) -> Result<f64, BotError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(BotError::InvalidSettings(format!("{field} must be a positive number, got {value}")))
    }
}

fn parse_address(field: &str, raw: Option<&str>) -> Result<Address, BotError> {
    let raw = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| BotError::InvalidSettings(format!("{field} is not set")))?;

    Address::from_str(raw)
        .map_err(|_| BotError::InvalidSettings(format!("{field} is not a valid address: {raw}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NewBotSettings;
    use rust_decimal_macros::dec;

    const ROUTER: &str = "0x10ED43C718714eb63d5aA57B78B54704E256024E";
    const TOKEN: &str = "0x4dB7B2fD0a370170a874926B6Fd98d34d3D488B5";

    fn settings(user_id: UserId) -> NewBotSettings {
        NewBotSettings {
            user_id,
            target_price: 0.5,
            lower_target_price: 0.3,
            sell_amount_usd: dec!(10),
            approval_required: true,
            router_address: Some(ROUTER.to_string()),
            token_address: Some(TOKEN.to_string()),
        }
    }

    #[tokio::test]
    async fn test_load_parameters() {
        let db = Database::in_memory().await.unwrap();
        let user = UserId::new();
        db.upsert_settings(&settings(user)).await.unwrap();

        let quote = Address::repeat_byte(3);
        let recipient = Address::repeat_byte(4);
        let (params, route) = load_parameters(&db, &user.to_string(), quote, recipient)
            .await
            .unwrap();

        assert_eq!(params.owner, user);
        assert_eq!(params.upper_target_price, 0.5);
        assert_eq!(params.lower_target_price, 0.3);
        assert_eq!(params.sell_amount_usd, dec!(10));
        assert!(params.approval_required);
        assert_eq!(route.router, Address::from_str(ROUTER).unwrap());
        assert_eq!(route.path(), vec![Address::from_str(TOKEN).unwrap(), quote]);
        assert_eq!(route.recipient, recipient);
    }

    #[tokio::test]
    async fn test_invalid_user_id() {
        let db = Database::in_memory().await.unwrap();
        let err = load_parameters(&db, "42", Address::ZERO, Address::ZERO)
            .await
            .unwrap_err();
        assert!(matches!(err, BotError::InvalidUserId(_)));
    }

    #[tokio::test]
    async fn test_settings_not_found() {
        let db = Database::in_memory().await.unwrap();
        let err = load_parameters(&db, &UserId::new().to_string(), Address::ZERO, Address::ZERO)
            .await
            .unwrap_err();
        assert!(matches!(err, BotError::SettingsNotFound));
    }

    #[tokio::test]
    async fn test_missing_router_rejected() {
        let db = Database::in_memory().await.unwrap();
        let user = UserId::new();
        let mut new = settings(user);
        new.router_address = None;
        db.upsert_settings(&new).await.unwrap();

        let err = load_parameters(&db, &user.to_string(), Address::ZERO, Address::ZERO)
            .await
            .unwrap_err();
        assert!(matches!(err, BotError::InvalidSettings(ref m) if m.contains("routerAddress")));
    }

    #[test]
    fn test_bad_numbers_rejected() {
        let now = chrono::Utc::now();
        let mut stored = BotSettings {
            id: 1,
            user_id: UserId::new(),
            target_price: 0.5,
            lower_target_price: 0.3,
            sell_amount_usd: dec!(10),
            approval_required: false,
            router_address: Some(ROUTER.to_string()),
            token_address: Some("not-an-address".to_string()),
            created_at: now,
            updated_at: now,
        };
        assert!(to_trading_parameters(&stored).is_err());

        stored.token_address = Some(TOKEN.to_string());
        assert!(to_trading_parameters(&stored).is_ok());

        stored.lower_target_price = f64::NAN;
        assert!(to_trading_parameters(&stored).is_err());

        stored.lower_target_price = 0.3;
        stored.sell_amount_usd = Decimal::ZERO;
        assert!(to_trading_parameters(&stored).is_err());
    }

    #[test]
    fn test_upper_below_lower_is_allowed() {
        let now = chrono::Utc::now();
        let stored = BotSettings {
            id: 1,
            user_id: UserId::new(),
            target_price: 0.2,
            lower_target_price: 0.3,
            sell_amount_usd: dec!(10),
            approval_required: false,
            router_address: Some(ROUTER.to_string()),
            token_address: Some(TOKEN.to_string()),
            created_at: now,
            updated_at: now,
        };
        let params = to_trading_parameters(&stored).unwrap();
        assert!(params.upper_target_price < params.lower_target_price);
    }
}
