//! Exchange rate time series

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::traits::*;
use crate::types::*;

/// Looks up directional exchange rates effective on a date
pub struct RateResolver<S: LedgerStorage> {
    storage: S,
}

impl<S: LedgerStorage> RateResolver<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Append a rate to its pair's history. Existing rates are never overwritten;
    /// for a repeated effective date the later-recorded rate takes precedence.
    pub async fn add_rate(&self, attrs: NewExchangeRate) -> LedgerResult<ExchangeRate> {
        if attrs.rate <= BigDecimal::from(0) {
            return Err(LedgerError::Validation(
                "Exchange rate must be positive".to_string(),
            ));
        }
        if attrs.from_currency.as_str().is_empty() || attrs.to_currency.as_str().is_empty() {
            return Err(LedgerError::Validation(
                "Exchange rate currencies cannot be empty".to_string(),
            ));
        }
        if attrs.from_currency == attrs.to_currency {
            return Err(LedgerError::Validation(format!(
                "Exchange rate needs two currencies, got {} twice",
                attrs.from_currency
            )));
        }

        let rate = ExchangeRate {
            from_currency: attrs.from_currency,
            to_currency: attrs.to_currency,
            rate: attrs.rate,
            effective_date: attrs.effective_date,
            notes: attrs.notes,
            created_at: chrono::Utc::now().naive_utc(),
        };

        let mut tx = self.storage.begin().await?;
        tx.insert_rate(&rate).await?;
        tx.commit().await?;

        info!(
            from = %rate.from_currency,
            to = %rate.to_currency,
            rate = %rate.rate,
            effective = %rate.effective_date,
            "exchange rate recorded"
        );
        Ok(rate)
    }

    /// Units of `to` per one `from`, effective on `date`
    pub async fn resolve_rate(
        &self,
        from: &CurrencyCode,
        to: &CurrencyCode,
        date: NaiveDate,
    ) -> LedgerResult<BigDecimal> {
        if from == to {
            return Ok(BigDecimal::from(1));
        }
        let mut tx = self.storage.begin().await?;
        resolve_rate_in(&mut tx, from, to, date).await
    }

    /// History of a pair ordered by effective date
    pub async fn list_rates(
        &self,
        from: &CurrencyCode,
        to: &CurrencyCode,
    ) -> LedgerResult<Vec<ExchangeRate>> {
        let mut rates = self.storage.begin().await?.list_rates(from, to).await?;
        rates.sort_by_key(|r| r.effective_date);
        Ok(rates)
    }
}

/// Rate lookup against an open transaction
pub(crate) async fn resolve_rate_in<T: StorageTransaction>(
    tx: &mut T,
    from: &CurrencyCode,
    to: &CurrencyCode,
    date: NaiveDate,
) -> LedgerResult<BigDecimal> {
    if from == to {
        return Ok(BigDecimal::from(1));
    }

    // Insertion order: a later rate for the same date replaces the earlier one
    let series: BTreeMap<NaiveDate, BigDecimal> = tx
        .list_rates(from, to)
        .await?
        .into_iter()
        .map(|r| (r.effective_date, r.rate))
        .collect();

    match series.range(..=date).next_back() {
        Some((effective, rate)) => {
            debug!(%from, %to, %date, %effective, %rate, "exchange rate resolved");
            Ok(rate.clone())
        }
        None => Err(LedgerError::RateNotFound {
            from: from.clone(),
            to: to.clone(),
            date,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::memory_storage::MemoryStorage;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn test_latest_rate_on_or_before_date() {
        let rates = RateResolver::new(MemoryStorage::new());
        let usd = CurrencyCode::new("USD");
        let yer = CurrencyCode::new("YER");

        rates
            .add_rate(NewExchangeRate::new("USD", "YER", BigDecimal::from(260), date(2024, 2, 1)))
            .await
            .unwrap();
        rates
            .add_rate(NewExchangeRate::new("USD", "YER", BigDecimal::from(250), date(2024, 1, 1)))
            .await
            .unwrap();

        assert_eq!(
            rates.resolve_rate(&usd, &yer, date(2024, 1, 15)).await.unwrap(),
            BigDecimal::from(250)
        );
        assert_eq!(
            rates.resolve_rate(&usd, &yer, date(2024, 2, 1)).await.unwrap(),
            BigDecimal::from(260)
        );
        assert_eq!(
            rates.resolve_rate(&usd, &yer, date(2023, 12, 31)).await.unwrap_err(),
            LedgerError::RateNotFound {
                from: usd.clone(),
                to: yer.clone(),
                date: date(2023, 12, 31),
            }
        );

        // Directional: the inverse pair is never inferred
        assert!(matches!(
            rates.resolve_rate(&yer, &usd, date(2024, 3, 1)).await,
            Err(LedgerError::RateNotFound { .. })
        ));

        let history = rates.list_rates(&usd, &yer).await.unwrap();
        assert_eq!(history[0].rate, BigDecimal::from(250));
        assert_eq!(history[1].rate, BigDecimal::from(260));
    }

    #[tokio::test]
    async fn test_same_currency_and_same_date_rules() {
        let rates = RateResolver::new(MemoryStorage::new());
        let sar = CurrencyCode::new("sar");
        assert_eq!(
            rates.resolve_rate(&sar, &sar, date(2000, 1, 1)).await.unwrap(),
            BigDecimal::from(1)
        );

        rates
            .add_rate(NewExchangeRate::new(
                "YER",
                "SAR",
                "0.025".parse().unwrap(),
                date(2024, 1, 1),
            ))
            .await
            .unwrap();
        rates
            .add_rate(NewExchangeRate::new(
                "YER",
                "SAR",
                "0.024".parse().unwrap(),
                date(2024, 1, 1),
            ))
            .await
            .unwrap();
        assert_eq!(
            rates
                .resolve_rate(&CurrencyCode::new("YER"), &sar, date(2024, 1, 1))
                .await
                .unwrap(),
            "0.024".parse::<BigDecimal>().unwrap()
        );

        let err = rates
            .add_rate(NewExchangeRate::new("YER", "SAR", BigDecimal::from(0), date(2024, 1, 1)))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
        let err = rates
            .add_rate(NewExchangeRate::new("YER", "yer", BigDecimal::from(1), date(2024, 1, 1)))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
    }
}
