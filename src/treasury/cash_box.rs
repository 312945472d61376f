//! Cash boxes and currency exchanges between them

use bigdecimal::{BigDecimal, RoundingMode};
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::LedgerConfig;
use crate::traits::*;
use crate::types::*;
use crate::utils::validation::{validate_non_negative_amount, validate_required};

/// Executes cross-currency transfers between cash boxes
pub struct CashBoxExecutor<S: LedgerStorage> {
    storage: S,
    config: Arc<LedgerConfig>,
}

impl<S: LedgerStorage> CashBoxExecutor<S> {
    pub fn new(storage: S, config: Arc<LedgerConfig>) -> Self {
        Self { storage, config }
    }

    pub async fn create_cash_box(&self, attrs: NewCashBox) -> LedgerResult<CashBox> {
        validate_required(&attrs.code, "Cash box code")?;
        validate_required(&attrs.name, "Cash box name")?;
        validate_required(attrs.currency_code.as_str(), "Cash box currency")?;
        validate_non_negative_amount(&attrs.opening_balance, "Opening balance")?;

        let now = chrono::Utc::now().naive_utc();
        let cash_box = CashBox {
            id: CashBoxId::new(),
            code: attrs.code.trim().to_string(),
            name: attrs.name.trim().to_string(),
            currency_code: attrs.currency_code,
            current_balance: attrs.opening_balance,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        let mut tx = self.storage.begin().await?;
        if tx
            .list_cash_boxes()
            .await?
            .iter()
            .any(|b| b.code == cash_box.code)
        {
            return Err(LedgerError::Validation(format!(
                "Cash box with code '{}' already exists",
                cash_box.code
            )));
        }
        tx.insert_cash_box(&cash_box).await?;
        tx.commit().await?;

        info!(code = %cash_box.code, currency = %cash_box.currency_code, "cash box created");
        Ok(cash_box)
    }

    pub async fn get_cash_box(&self, id: CashBoxId) -> LedgerResult<Option<CashBox>> {
        self.storage.begin().await?.get_cash_box(id).await
    }

    pub async fn list_cash_boxes(&self) -> LedgerResult<Vec<CashBox>> {
        self.storage.begin().await?.list_cash_boxes().await
    }

    /// Take a box out of service; its balance is kept but it can no longer exchange
    pub async fn deactivate_cash_box(&self, id: CashBoxId) -> LedgerResult<CashBox> {
        let mut tx = self.storage.begin().await?;
        let mut cash_box = tx
            .get_cash_box(id)
            .await?
            .ok_or_else(|| LedgerError::CashBoxNotFound(id.to_string()))?;
        if !cash_box.is_active {
            return Ok(cash_box);
        }
        cash_box.is_active = false;
        cash_box.updated_at = chrono::Utc::now().naive_utc();
        tx.update_cash_box(&cash_box).await?;
        tx.commit().await?;

        info!(code = %cash_box.code, "cash box deactivated");
        Ok(cash_box)
    }

    pub async fn list_exchanges(&self) -> LedgerResult<Vec<CashBoxExchange>> {
        self.storage.begin().await?.list_exchanges().await
    }

    /// Move `from_amount` out of one box and its converted value into another.
    ///
    /// The rate is the one effective on `date`; the converted amount is rounded
    /// half-up to the configured scale. Both balances and the exchange record
    /// commit together.
    pub async fn execute_exchange(
        &self,
        from_box_id: CashBoxId,
        to_box_id: CashBoxId,
        from_amount: BigDecimal,
        date: NaiveDate,
        notes: Option<String>,
    ) -> LedgerResult<CashBoxExchange> {
        if from_box_id == to_box_id {
            return Err(LedgerError::Validation(
                "Cannot exchange a cash box with itself".to_string(),
            ));
        }

        let mut tx = self.storage.begin().await?;
        let mut from_box = tx
            .get_cash_box(from_box_id)
            .await?
            .ok_or_else(|| LedgerError::CashBoxNotFound(from_box_id.to_string()))?;
        let mut to_box = tx
            .get_cash_box(to_box_id)
            .await?
            .ok_or_else(|| LedgerError::CashBoxNotFound(to_box_id.to_string()))?;

        if from_box.currency_code == to_box.currency_code {
            return Err(LedgerError::SameCurrencyExchange(from_box.currency_code));
        }
        if from_amount <= BigDecimal::from(0) {
            return Err(LedgerError::Validation(
                "Exchange amount must be positive".to_string(),
            ));
        }
        for cash_box in [&from_box, &to_box] {
            if !cash_box.is_active {
                return Err(LedgerError::Validation(format!(
                    "Cash box '{}' is inactive",
                    cash_box.code
                )));
            }
        }

        let rate = super::rates::resolve_rate_in(
            &mut tx,
            &from_box.currency_code,
            &to_box.currency_code,
            date,
        )
        .await?;

        if from_amount > from_box.current_balance {
            warn!(
                code = %from_box.code,
                available = %from_box.current_balance,
                requested = %from_amount,
                "exchange exceeds cash box balance"
            );
            return Err(LedgerError::InsufficientBalance {
                available: from_box.current_balance,
                requested: from_amount,
            });
        }

        let to_amount =
            (&from_amount * &rate).with_scale_round(self.config.amount_scale, RoundingMode::HalfUp);
        if to_amount <= BigDecimal::from(0) {
            warn!(
                code = %from_box.code,
                amount = %from_amount,
                rate = %rate,
                "exchange converts to nothing at this scale"
            );
            return Err(LedgerError::Validation(format!(
                "Exchange of {} {} converts to zero {}",
                from_amount, from_box.currency_code, to_box.currency_code
            )));
        }

        let now = chrono::Utc::now().naive_utc();
        from_box.current_balance -= &from_amount;
        from_box.updated_at = now;
        to_box.current_balance += &to_amount;
        to_box.updated_at = now;
        tx.update_cash_box(&from_box).await?;
        tx.update_cash_box(&to_box).await?;

        let format = &self.config.numbering.exchange;
        let value = tx.next_sequence_value(&format.counter).await?;
        let exchange = CashBoxExchange {
            id: ExchangeId::new(),
            exchange_number: format.format(value),
            from_box_id,
            to_box_id,
            from_amount,
            to_amount,
            exchange_rate: rate,
            date,
            status: ExchangeStatus::Posted,
            notes,
            created_at: now,
        };
        tx.insert_exchange(&exchange).await?;
        tx.commit().await?;

        info!(
            exchange_number = %exchange.exchange_number,
            from = %from_box.code,
            to = %to_box.code,
            from_amount = %exchange.from_amount,
            to_amount = %exchange.to_amount,
            rate = %exchange.exchange_rate,
            "cash box exchange posted"
        );
        Ok(exchange)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::treasury::rates::RateResolver;
    use crate::utils::memory_storage::MemoryStorage;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 4, 10).unwrap()
    }

    async fn setup() -> (CashBoxExecutor<MemoryStorage>, CashBox, CashBox) {
        let storage = MemoryStorage::new();
        RateResolver::new(storage.clone())
            .add_rate(NewExchangeRate::new("YER", "SAR", "0.024".parse().unwrap(), day()))
            .await
            .unwrap();
        let executor = CashBoxExecutor::new(storage, Arc::new(LedgerConfig::default()));
        let yer = executor
            .create_cash_box(NewCashBox::new("CB-YER", "Main till", "YER", BigDecimal::from(5000)))
            .await
            .unwrap();
        let sar = executor
            .create_cash_box(NewCashBox::new("CB-SAR", "Riyal box", "SAR", BigDecimal::from(0)))
            .await
            .unwrap();
        (executor, yer, sar)
    }

    #[tokio::test]
    async fn test_exchange_rounds_and_numbers() {
        let (executor, yer, sar) = setup().await;

        let exchange = executor
            .execute_exchange(yer.id, sar.id, "1234.56".parse().unwrap(), day(), None)
            .await
            .unwrap();
        // 1234.56 * 0.024 = 29.62944
        assert_eq!(exchange.to_amount, "29.63".parse::<BigDecimal>().unwrap());
        assert_eq!(exchange.exchange_number, "EX000001");
        assert_eq!(exchange.status, ExchangeStatus::Posted);

        let yer = executor.get_cash_box(yer.id).await.unwrap().unwrap();
        assert_eq!(yer.current_balance, "3765.44".parse::<BigDecimal>().unwrap());
    }

    #[tokio::test]
    async fn test_exchange_preconditions() {
        let (executor, yer, sar) = setup().await;
        let other_yer = executor
            .create_cash_box(NewCashBox::new("CB-YER2", "Back office", "YER", BigDecimal::from(10)))
            .await
            .unwrap();

        let err = executor
            .execute_exchange(yer.id, yer.id, BigDecimal::from(1), day(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));

        let err = executor
            .execute_exchange(yer.id, other_yer.id, BigDecimal::from(1), day(), None)
            .await
            .unwrap_err();
        assert_eq!(err, LedgerError::SameCurrencyExchange(CurrencyCode::new("YER")));

        let err = executor
            .execute_exchange(yer.id, sar.id, BigDecimal::from(0), day(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));

        let err = executor
            .execute_exchange(sar.id, yer.id, BigDecimal::from(1), day(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::RateNotFound { .. }));

        let err = executor
            .execute_exchange(yer.id, CashBoxId::new(), BigDecimal::from(1), day(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::CashBoxNotFound(_)));

        executor.deactivate_cash_box(sar.id).await.unwrap();
        let err = executor
            .execute_exchange(yer.id, sar.id, BigDecimal::from(1), day(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));

        assert!(executor.list_exchanges().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_exchange_rounding_to_zero_rejected() {
        let (executor, yer, sar) = setup().await;

        // 0.1 * 0.024 = 0.0024 -> 0.00
        let err = executor
            .execute_exchange(yer.id, sar.id, "0.1".parse().unwrap(), day(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));

        let yer = executor.get_cash_box(yer.id).await.unwrap().unwrap();
        let sar = executor.get_cash_box(sar.id).await.unwrap().unwrap();
        assert_eq!(yer.current_balance, BigDecimal::from(5000));
        assert_eq!(sar.current_balance, BigDecimal::from(0));
        assert!(executor.list_exchanges().await.unwrap().is_empty());

        // Smallest amount that still rounds to 0.01
        let exchange = executor
            .execute_exchange(yer.id, sar.id, "0.21".parse().unwrap(), day(), None)
            .await
            .unwrap();
        assert_eq!(exchange.to_amount, "0.01".parse::<BigDecimal>().unwrap());
        assert_eq!(exchange.exchange_number, "EX000001");
    }

    #[tokio::test]
    async fn test_duplicate_code_and_negative_opening_balance() {
        let (executor, _, _) = setup().await;
        let err = executor
            .create_cash_box(NewCashBox::new("CB-YER", "Again", "YER", BigDecimal::from(0)))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));

        let err = executor
            .create_cash_box(NewCashBox::new("CB-X", "Broken", "USD", BigDecimal::from(-1)))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
        assert_eq!(executor.list_cash_boxes().await.unwrap().len(), 2);
    }
}
