//! Per-user trading settings endpoints

use super::{api_error, ApiError, ErrorResponse};
use crate::api::server::AppState;
use crate::error::BotError;
use crate::types::{BotSettings, NewBotSettings, UserId};
use alloy::primitives::Address;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{de, Deserialize, Deserializer, Serialize};
use std::str::FromStr;
use tracing::info;

/// Settings as sent by the frontend
///
/// Form inputs arrive as strings, so the prices and `approvalRequired` accept
/// either a JSON scalar or its text form. `sellAmountUSD` already does.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsRequest {
    #[serde(default, deserialize_with = "number_or_text")]
    pub target_price: Option<f64>,
    #[serde(default, deserialize_with = "number_or_text")]
    pub lower_target_price: Option<f64>,
    #[serde(rename = "sellAmountUSD")]
    pub sell_amount_usd: Option<Decimal>,
    #[serde(default, deserialize_with = "bool_or_text")]
    pub approval_required: bool,
    pub router_address: Option<String>,
    pub token_address: Option<String>,
    pub user_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar<T> {
    Value(T),
    Text(String),
}

fn number_or_text<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Scalar<f64>>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Scalar::Value(n)) => Ok(Some(n)),
        Some(Scalar::Text(text)) => match text.trim() {
            "" => Ok(None),
            t => t
                .parse::<f64>()
                .map(Some)
                .map_err(|_| de::Error::custom(format!("expected a number, got \"{t}\""))),
        },
    }
}

fn bool_or_text<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Scalar<bool>>::deserialize(deserializer)? {
        None => Ok(false),
        Some(Scalar::Value(b)) => Ok(b),
        Some(Scalar::Text(text)) => match text.trim().to_ascii_lowercase().as_str() {
            "" | "false" => Ok(false),
            "true" => Ok(true),
            t => Err(de::Error::custom(format!("expected true or false, got \"{t}\""))),
        },
    }
}

/// Settings DTO for frontend
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsDto {
    pub user_id: UserId,
    pub target_price: f64,
    pub lower_target_price: f64,
    #[serde(rename = "sellAmountUSD", with = "rust_decimal::serde::float")]
    pub sell_amount_usd: Decimal,
    pub approval_required: bool,
    pub router_address: Option<String>,
    pub token_address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<BotSettings> for SettingsDto {
    fn from(s: BotSettings) -> Self {
        Self {
            user_id: s.user_id,
            target_price: s.target_price,
            lower_target_price: s.lower_target_price,
            sell_amount_usd: s.sell_amount_usd,
            approval_required: s.approval_required,
            router_address: s.router_address,
            token_address: s.token_address,
            created_at: s.created_at,
            updated_at: s.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SaveSettingsResponse {
    pub message: String,
    pub settings: SettingsDto,
}

impl SettingsRequest {
    /// Validate into an upsert; absent or zero required fields are "missing"
    pub fn into_new_settings(self) -> Result<NewBotSettings, BotError> {
        let target_price = self.target_price.filter(|p| *p != 0.0);
        let lower_target_price = self.lower_target_price.filter(|p| *p != 0.0);
        let sell_amount_usd = self.sell_amount_usd.filter(|a| !a.is_zero());
        let user_id = self.user_id.filter(|u| !u.trim().is_empty());

        let (Some(target_price), Some(lower_target_price), Some(sell_amount_usd), Some(user_id)) =
            (target_price, lower_target_price, sell_amount_usd, user_id)
        else {
            return Err(BotError::MissingParameters);
        };

        let user_id = UserId::parse(&user_id)?;

        for (field, value) in [("targetPrice", target_price), ("lowerTargetPrice", lower_target_price)] {
            if !value.is_finite() || value < 0.0 {
                return Err(BotError::InvalidSettings(format!(
                    "{field} must be a positive number, got {value}"
                )));
            }
        }
        if sell_amount_usd.is_sign_negative() {
            return Err(BotError::InvalidSettings(format!(
                "sellAmountUSD must be positive, got {sell_amount_usd}"
            )));
        }

        Ok(NewBotSettings {
            user_id,
            target_price,
            lower_target_price,
            sell_amount_usd,
            approval_required: self.approval_required,
            router_address: normalize_address("routerAddress", self.router_address)?,
            token_address: normalize_address("tokenAddress", self.token_address)?,
        })
    }
}

/// Blank means unset; anything else must be a valid address
fn normalize_address(field: &str, raw: Option<String>) -> Result<Option<String>, BotError> {
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => Address::from_str(value)
            .map(|addr| Some(addr.to_checksum(None)))
            .map_err(|_| BotError::InvalidSettings(format!("{field} is not a valid address: {value}"))),
    }
}

/// Body rejections (bad JSON, wrong content type, type mismatches) as a 400 JSON error
fn body_error(rejection: JsonRejection) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: "Invalid request body".to_string(),
            message: Some(rejection.body_text()),
        }),
    )
}

/// POST /settings
pub async fn save_settings(
    State(state): State<AppState>,
    payload: Result<Json<SettingsRequest>, JsonRejection>,
) -> Result<Json<SaveSettingsResponse>, ApiError> {
    let Json(req) = payload.map_err(body_error)?;
    let new = req
        .into_new_settings()
        .map_err(|e| api_error(e, "Failed to update trading parameters"))?;

    let outcome = state
        .db
        .upsert_settings(&new)
        .await
        .map_err(|e| api_error(e.into(), "Failed to update trading parameters"))?;

    let message = if outcome.created {
        "Bot settings created successfully"
    } else {
        "Bot settings updated successfully"
    };
    info!(user_id = %new.user_id, created = outcome.created, "Settings saved");

    Ok(Json(SaveSettingsResponse {
        message: message.to_string(),
        settings: outcome.settings.into(),
    }))
}

/// GET /settings/:user_id
pub async fn get_settings(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<SettingsDto>, ApiError> {
    let user_id =
        UserId::parse(&user_id).map_err(|e| api_error(e, "Failed to fetch bot settings"))?;

    let settings = state
        .db
        .get_settings_for_user(&user_id)
        .await
        .map_err(|e| api_error(e.into(), "Failed to fetch bot settings"))?
        .ok_or_else(|| api_error(BotError::SettingsNotFound, "Failed to fetch bot settings"))?;

    Ok(Json(settings.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn request(json: serde_json::Value) -> SettingsRequest {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_request_parses_frontend_fields() {
        let user = UserId::new();
        let new = request(serde_json::json!({
            "targetPrice": 0.5,
            "lowerTargetPrice": 0.3,
            "sellAmountUSD": 25,
            "approvalRequired": true,
            "routerAddress": "0x10ed43c718714eb63d5aa57b78b54704e256024e",
            "tokenAddress": "",
            "userId": user.to_string(),
        }))
        .into_new_settings()
        .unwrap();

        assert_eq!(new.user_id, user);
        assert_eq!(new.sell_amount_usd, dec!(25));
        assert!(new.approval_required);
        assert_eq!(
            new.router_address.as_deref(),
            Some("0x10ED43C718714eb63d5aA57B78B54704E256024E")
        );
        assert!(new.token_address.is_none());
    }

    #[test]
    fn test_missing_or_zero_fields() {
        let user = UserId::new().to_string();
        let missing_target = request(serde_json::json!({
            "lowerTargetPrice": 0.3, "sellAmountUSD": 25, "userId": user,
        }));
        assert!(matches!(missing_target.into_new_settings(), Err(BotError::MissingParameters)));

        let zero_amount = request(serde_json::json!({
            "targetPrice": 0.5, "lowerTargetPrice": 0.3, "sellAmountUSD": 0, "userId": user,
        }));
        assert!(matches!(zero_amount.into_new_settings(), Err(BotError::MissingParameters)));

        let no_user = request(serde_json::json!({
            "targetPrice": 0.5, "lowerTargetPrice": 0.3, "sellAmountUSD": 25,
        }));
        assert!(matches!(no_user.into_new_settings(), Err(BotError::MissingParameters)));
    }

    #[test]
    fn test_invalid_values() {
        let bad_user = request(serde_json::json!({
            "targetPrice": 0.5, "lowerTargetPrice": 0.3, "sellAmountUSD": 25, "userId": "abc",
        }));
        assert!(matches!(bad_user.into_new_settings(), Err(BotError::InvalidUserId(_))));

        let bad_router = request(serde_json::json!({
            "targetPrice": 0.5, "lowerTargetPrice": 0.3, "sellAmountUSD": 25,
            "userId": UserId::new().to_string(), "routerAddress": "pancake",
        }));
        assert!(matches!(bad_router.into_new_settings(), Err(BotError::InvalidSettings(_))));

        let negative = request(serde_json::json!({
            "targetPrice": -0.5, "lowerTargetPrice": 0.3, "sellAmountUSD": 25,
            "userId": UserId::new().to_string(),
        }));
        assert!(matches!(negative.into_new_settings(), Err(BotError::InvalidSettings(_))));
    }

    #[test]
    fn test_form_strings_accepted() {
        let user = UserId::new();
        let new = request(serde_json::json!({
            "targetPrice": "0.5",
            "lowerTargetPrice": " 0.3 ",
            "sellAmountUSD": "25",
            "approvalRequired": "true",
            "userId": user.to_string(),
        }))
        .into_new_settings()
        .unwrap();

        assert_eq!(new.target_price, 0.5);
        assert_eq!(new.lower_target_price, 0.3);
        assert_eq!(new.sell_amount_usd, dec!(25));
        assert!(new.approval_required);
    }

    #[test]
    fn test_blank_and_null_strings_are_missing() {
        let req = request(serde_json::json!({
            "targetPrice": "",
            "lowerTargetPrice": null,
            "sellAmountUSD": 25,
            "approvalRequired": "",
            "userId": UserId::new().to_string(),
        }));
        assert!(req.target_price.is_none());
        assert!(req.lower_target_price.is_none());
        assert!(!req.approval_required);
        assert!(matches!(req.into_new_settings(), Err(BotError::MissingParameters)));
    }

    #[test]
    fn test_non_numeric_text_rejected() {
        let price = serde_json::from_value::<SettingsRequest>(serde_json::json!({
            "targetPrice": "half", "lowerTargetPrice": 0.3,
        }));
        assert!(price.unwrap_err().to_string().contains("expected a number"));

        let flag = serde_json::from_value::<SettingsRequest>(serde_json::json!({
            "approvalRequired": "yes",
        }));
        assert!(flag.is_err());
    }
}
