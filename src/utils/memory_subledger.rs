//! In-memory customer/supplier subledger for testing and development

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::traits::*;
use crate::types::*;

#[derive(Debug, Clone)]
struct SubledgerAccount {
    name: String,
    stored_balance: BigDecimal,
    documents: Vec<SubledgerDocument>,
}

impl SubledgerAccount {
    fn has_activity(&self) -> bool {
        !self.documents.is_empty() || self.stored_balance != BigDecimal::from(0)
    }
}

type Book = BTreeMap<(EntityKind, String), SubledgerAccount>;

/// Subledger whose running balances are maintained incrementally, the way the
/// customer and supplier modules do it, and can drift from their documents.
#[derive(Debug, Clone, Default)]
pub struct MemorySubledger {
    book: Arc<RwLock<Book>>,
}

impl MemorySubledger {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> LedgerResult<RwLockReadGuard<'_, Book>> {
        self.book
            .read()
            .map_err(|_| LedgerError::Storage("subledger lock poisoned".to_string()))
    }

    fn write(&self) -> LedgerResult<RwLockWriteGuard<'_, Book>> {
        self.book
            .write()
            .map_err(|_| LedgerError::Storage("subledger lock poisoned".to_string()))
    }

    /// Register a customer or supplier with a zero balance
    pub fn register(
        &self,
        kind: EntityKind,
        entity_id: impl Into<String>,
        name: impl Into<String>,
    ) -> LedgerResult<()> {
        self.write()?
            .entry((kind, entity_id.into()))
            .or_insert_with(|| SubledgerAccount {
                name: String::new(),
                stored_balance: BigDecimal::from(0),
                documents: Vec::new(),
            })
            .name = name.into();
        Ok(())
    }

    /// Record a document and move the running balance by its effect
    pub fn record_document(
        &self,
        kind: EntityKind,
        entity_id: &str,
        document: SubledgerDocument,
    ) -> LedgerResult<()> {
        let mut book = self.write()?;
        let account = book
            .get_mut(&(kind, entity_id.to_string()))
            .ok_or_else(|| LedgerError::RecordNotFound(format!("{kind} {entity_id}")))?;
        account.stored_balance += document.balance_effect();
        account.documents.push(document);
        Ok(())
    }

    /// Overwrite the running balance without touching documents
    pub fn set_stored_balance(
        &self,
        kind: EntityKind,
        entity_id: &str,
        balance: BigDecimal,
    ) -> LedgerResult<()> {
        let mut book = self.write()?;
        let account = book
            .get_mut(&(kind, entity_id.to_string()))
            .ok_or_else(|| LedgerError::RecordNotFound(format!("{kind} {entity_id}")))?;
        account.stored_balance = balance;
        Ok(())
    }
}

#[async_trait]
impl SubledgerProvider for MemorySubledger {
    async fn list_balances(&self, kind: EntityKind) -> LedgerResult<Vec<SubledgerBalance>> {
        Ok(self
            .read()?
            .iter()
            .filter(|((k, _), account)| *k == kind && account.has_activity())
            .map(|((_, id), account)| SubledgerBalance {
                entity_id: id.clone(),
                entity_name: account.name.clone(),
                balance: account.stored_balance.clone(),
            })
            .collect())
    }

    async fn get_subledger_balance(
        &self,
        kind: EntityKind,
        entity_id: &str,
    ) -> LedgerResult<Option<SubledgerBalance>> {
        Ok(self
            .read()?
            .get(&(kind, entity_id.to_string()))
            .map(|account| SubledgerBalance {
                entity_id: entity_id.to_string(),
                entity_name: account.name.clone(),
                balance: account.stored_balance.clone(),
            }))
    }

    async fn entity_name(&self, kind: EntityKind, entity_id: &str) -> LedgerResult<Option<String>> {
        Ok(self
            .read()?
            .get(&(kind, entity_id.to_string()))
            .map(|account| account.name.clone()))
    }

    async fn documents(
        &self,
        kind: EntityKind,
        entity_id: &str,
    ) -> LedgerResult<Vec<SubledgerDocument>> {
        self.read()?
            .get(&(kind, entity_id.to_string()))
            .map(|account| account.documents.clone())
            .ok_or_else(|| LedgerError::RecordNotFound(format!("{kind} {entity_id}")))
    }

    async fn store_balance(
        &self,
        kind: EntityKind,
        entity_id: &str,
        balance: &BigDecimal,
    ) -> LedgerResult<()> {
        self.set_stored_balance(kind, entity_id, balance.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    #[tokio::test]
    async fn test_documents_move_running_balance() {
        let subledger = MemorySubledger::new();
        subledger
            .register(EntityKind::Customer, "C1", "Al-Noor Clinic")
            .unwrap();
        subledger
            .record_document(
                EntityKind::Customer,
                "C1",
                SubledgerDocument::invoice("INV-1", BigDecimal::from(500), day(1)),
            )
            .unwrap();
        subledger
            .record_document(
                EntityKind::Customer,
                "C1",
                SubledgerDocument::payment("PAY-1", BigDecimal::from(200), day(2)),
            )
            .unwrap();
        subledger
            .record_document(
                EntityKind::Customer,
                "C1",
                SubledgerDocument::invoice("INV-2", BigDecimal::from(900), day(3))
                    .with_status(DocumentStatus::Draft),
            )
            .unwrap();

        let balance = subledger
            .get_subledger_balance(EntityKind::Customer, "C1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(balance.balance, BigDecimal::from(300));
        assert_eq!(balance.entity_name, "Al-Noor Clinic");
    }

    #[tokio::test]
    async fn test_entities_without_activity_are_not_listed() {
        let subledger = MemorySubledger::new();
        subledger.register(EntityKind::Supplier, "S1", "Idle").unwrap();
        subledger.register(EntityKind::Supplier, "S2", "Busy").unwrap();
        subledger
            .set_stored_balance(EntityKind::Supplier, "S2", BigDecimal::from(10))
            .unwrap();

        let listed = subledger.list_balances(EntityKind::Supplier).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].entity_id, "S2");
        assert!(subledger
            .list_balances(EntityKind::Customer)
            .await
            .unwrap()
            .is_empty());
    }
}
