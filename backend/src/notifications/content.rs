//! Message text for outgoing notifications.

use rust_decimal::Decimal;

use crate::alerts::{AlertContext, ConditionType};

pub struct Message {
    pub subject: String,
    pub body: String,
}

/// Subject and body for a triggered price alert. Decimals are printed at
/// their stored scale, so a threshold of `180.00` reads as `180.00`.
pub fn price_alert(ctx: &AlertContext, price: Decimal, frontend_url: &str) -> Message {
    let alert = &ctx.alert;
    let threshold = match alert.condition {
        ConditionType::PercentChange => format!("{}%", alert.threshold),
        ConditionType::PriceAbove | ConditionType::PriceBelow => format!("${}", alert.threshold),
    };

    let body = format!(
        "Your price alert for {name} ({symbol}) has been triggered!\n\
         \n\
         Alert Condition: {condition}\n\
         Threshold: {threshold}\n\
         Current Price: ${price}\n\
         \n\
         View your watchlist: {url}/watchlist/\n\
         \n\
         Best regards,\n\
         Stock Watchlist Team\n",
        name = ctx.stock_name,
        symbol = ctx.symbol,
        condition = alert.condition.label(),
        url = frontend_url.trim_end_matches('/'),
    );

    Message {
        subject: format!("Price Alert: {}", ctx.symbol),
        body,
    }
}
