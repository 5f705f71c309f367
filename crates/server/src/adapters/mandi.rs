//! A fixed mandi price board used until a live market feed is wired in.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use krishi_core::adapters::{PriceUnit, RawMarket};
use krishi_core::{
    AdapterFailure, AdapterResponse, AdapterResult, Crop, FetchContext, MarketSource, RawPayload,
    Region, SourceId,
};
use rust_decimal::Decimal;

const BOARD_CONFIDENCE: f64 = 0.5;

#[derive(Clone, Debug)]
struct BoardEntry {
    crop: Crop,
    price: Decimal,
    trend: &'static str,
    markets: &'static [&'static str],
}

impl BoardEntry {
    fn new(
        crop: Crop,
        price: u32,
        trend: &'static str,
        markets: &'static [&'static str],
    ) -> Self {
        Self { crop, price: Decimal::from(price), trend, markets }
    }
}

#[derive(Clone, Debug)]
pub struct MandiPriceBoard {
    entries: Vec<BoardEntry>,
    published_at: Option<DateTime<Utc>>,
}

impl Default for MandiPriceBoard {
    fn default() -> Self {
        Self {
            entries: vec![
                BoardEntry::new(Crop::Rice, 2100, "stable", &["Delhi", "Mumbai", "Kolkata"]),
                BoardEntry::new(Crop::Wheat, 2050, "rising", &["Delhi", "Chandigarh", "Ludhiana"]),
                BoardEntry::new(Crop::Cotton, 6800, "falling", &["Ahmedabad", "Mumbai", "Nagpur"]),
                BoardEntry::new(Crop::Sugarcane, 350, "stable", &["Lucknow", "Pune", "Coimbatore"]),
                BoardEntry::new(Crop::Tomato, 1500, "volatile", &["Bangalore", "Delhi", "Mumbai"]),
                BoardEntry::new(Crop::Onion, 1200, "rising", &["Nashik", "Bangalore", "Delhi"]),
            ],
            published_at: None,
        }
    }
}

impl MandiPriceBoard {
    /// Pins the board's publication time; otherwise every read is stamped "now".
    pub fn published_at(mut self, at: DateTime<Utc>) -> Self {
        self.published_at = Some(at);
        self
    }

    pub fn price(&self, crop: Crop) -> Option<Decimal> {
        self.entry(crop).map(|entry| entry.price)
    }

    fn entry(&self, crop: Crop) -> Option<&BoardEntry> {
        self.entries.iter().find(|entry| entry.crop == crop)
    }
}

#[async_trait]
impl MarketSource for MandiPriceBoard {
    fn source_id(&self) -> SourceId {
        SourceId::new("mandi-board")
    }

    async fn fetch(
        &self,
        crop: Crop,
        _region: Option<&Region>,
        _ctx: &FetchContext,
    ) -> AdapterResult {
        let entry = self.entry(crop).ok_or_else(|| {
            AdapterFailure::invalid_key(self.source_id(), format!("no board price for {crop}"))
        })?;

        Ok(AdapterResponse {
            source_id: self.source_id(),
            confidence: BOARD_CONFIDENCE,
            observed_at: Some(self.published_at.unwrap_or_else(Utc::now)),
            payload: RawPayload::Market(RawMarket {
                price: Some(entry.price),
                currency: Some("INR".to_string()),
                unit: PriceUnit::Quintal,
                trend: Some(entry.trend.to_string()),
                markets: entry.markets.iter().map(|market| market.to_string()).collect(),
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};
    use krishi_core::{Crop, FetchContext, MarketSource, RawPayload};
    use rust_decimal::Decimal;

    use super::MandiPriceBoard;

    #[tokio::test]
    async fn board_quotes_per_quintal_in_rupees() {
        let published = Utc.with_ymd_and_hms(2026, 7, 10, 3, 0, 0).single().expect("timestamp");
        let board = MandiPriceBoard::default().published_at(published);
        let ctx = FetchContext::new(NaiveDate::from_ymd_opt(2026, 7, 10).expect("date"), 0);

        let response = board.fetch(Crop::Cotton, None, &ctx).await.expect("cotton is listed");

        assert_eq!(response.observed_at, Some(published));
        match response.payload {
            RawPayload::Market(raw) => {
                assert_eq!(raw.price, Some(Decimal::from(6800)));
                assert_eq!(raw.currency.as_deref(), Some("INR"));
                assert_eq!(raw.trend.as_deref(), Some("falling"));
                assert_eq!(raw.markets, vec!["Ahmedabad", "Mumbai", "Nagpur"]);
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }
}
