//! AR/AP reconciliation of customer and supplier subledgers against the ledger
//!
//! Subledger modules keep running balances per entity. These drift when a
//! document is edited without its journal entry (or the other way round); the
//! engine compares both sides entity by entity and can rebuild a running
//! balance from its source documents.

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::LedgerConfig;
use crate::traits::*;
use crate::types::*;

pub struct ReconciliationEngine<S: LedgerStorage, P: SubledgerProvider> {
    storage: S,
    subledger: P,
    config: Arc<LedgerConfig>,
}

impl<S: LedgerStorage, P: SubledgerProvider> ReconciliationEngine<S, P> {
    pub fn new(storage: S, subledger: P, config: Arc<LedgerConfig>) -> Self {
        Self {
            storage,
            subledger,
            config,
        }
    }

    /// Compare every entity's stored subledger balance with its ledger balance
    /// as of `as_of`. Rows are ordered by entity id; nothing is written.
    pub async fn reconcile(
        &self,
        kind: EntityKind,
        as_of: NaiveDate,
    ) -> LedgerResult<Vec<ReconciliationRow>> {
        let subledger: HashMap<String, SubledgerBalance> = self
            .subledger
            .list_balances(kind)
            .await?
            .into_iter()
            .map(|b| (b.entity_id.clone(), b))
            .collect();

        let gl = self.gl_balances(kind, as_of).await?;

        let ids: BTreeSet<&String> = subledger.keys().chain(gl.keys()).collect();
        let zero = BigDecimal::from(0);
        let mut rows = Vec::with_capacity(ids.len());

        for id in ids {
            let row = match (subledger.get(id), gl.get(id)) {
                (Some(sub), Some(gl_balance)) => {
                    let difference = &sub.balance - gl_balance;
                    let status = if self.config.within_tolerance(&difference) {
                        ReconciliationStatus::Matched
                    } else {
                        ReconciliationStatus::Mismatch
                    };
                    ReconciliationRow {
                        entity_id: id.clone(),
                        entity_name: sub.entity_name.clone(),
                        subledger_balance: sub.balance.clone(),
                        gl_balance: gl_balance.clone(),
                        difference,
                        status,
                    }
                }
                (Some(sub), None) => ReconciliationRow {
                    entity_id: id.clone(),
                    entity_name: sub.entity_name.clone(),
                    subledger_balance: sub.balance.clone(),
                    gl_balance: zero.clone(),
                    difference: sub.balance.clone(),
                    status: ReconciliationStatus::OnlyInSubledger,
                },
                (None, Some(gl_balance)) => {
                    let entity_name = self
                        .subledger
                        .entity_name(kind, id)
                        .await?
                        .unwrap_or_else(|| id.clone());
                    ReconciliationRow {
                        entity_id: id.clone(),
                        entity_name,
                        subledger_balance: zero.clone(),
                        gl_balance: gl_balance.clone(),
                        difference: -gl_balance.clone(),
                        status: ReconciliationStatus::OnlyInGl,
                    }
                }
                (None, None) => continue,
            };
            rows.push(row);
        }

        let summary = ReconciliationSummary::from_rows(&rows);
        if summary.is_clean() {
            info!(%kind, %as_of, entities = summary.total, "reconciliation clean");
        } else {
            warn!(
                %kind,
                %as_of,
                entities = summary.total,
                mismatched = summary.mismatched,
                only_in_subledger = summary.only_in_subledger,
                only_in_gl = summary.only_in_gl,
                total_difference = %summary.total_difference,
                "reconciliation found differences"
            );
        }
        Ok(rows)
    }

    /// Ledger balance per entity from posted, party-tagged lines, read through
    /// one transaction
    async fn gl_balances(
        &self,
        kind: EntityKind,
        as_of: NaiveDate,
    ) -> LedgerResult<HashMap<String, BigDecimal>> {
        let control = self.config.control_account(kind);
        let mut tx = self.storage.begin().await?;
        let entries = tx.list_entries(&EntryFilter::posted_until(Some(as_of))).await?;

        let mut balances: HashMap<String, BigDecimal> = HashMap::new();
        for line in entries.iter().flat_map(|e| e.lines.iter()) {
            let Some(party) = &line.party else {
                continue;
            };
            if party.kind != kind || control.is_some_and(|c| c != line.account_id) {
                continue;
            }
            *balances
                .entry(party.entity_id.clone())
                .or_insert_with(|| BigDecimal::from(0)) += kind.signed_amount(line);
        }

        debug!(
            %kind,
            entities = balances.len(),
            control = ?control,
            "ledger party balances derived"
        );
        Ok(balances)
    }

    /// Recompute an entity's running balance from its documents and store it.
    ///
    /// Only the subledger is written; the ledger is never touched. Running it
    /// twice yields the same balance.
    pub async fn rebuild_balance(
        &self,
        kind: EntityKind,
        entity_id: &str,
    ) -> LedgerResult<BigDecimal> {
        let previous = self
            .subledger
            .get_subledger_balance(kind, entity_id)
            .await?
            .ok_or_else(|| LedgerError::Validation(format!("Unknown {kind} '{entity_id}'")))?;

        let balance: BigDecimal = self
            .subledger
            .documents(kind, entity_id)
            .await?
            .iter()
            .map(SubledgerDocument::balance_effect)
            .sum();

        self.subledger
            .store_balance(kind, entity_id, &balance)
            .await?;

        info!(
            %kind,
            entity_id,
            previous = %previous.balance,
            rebuilt = %balance,
            "subledger balance rebuilt"
        );
        Ok(balance)
    }
}

/// Counts per status and the net difference of a reconciliation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationSummary {
    pub total: usize,
    pub matched: usize,
    pub mismatched: usize,
    pub only_in_subledger: usize,
    pub only_in_gl: usize,
    pub total_difference: BigDecimal,
}

impl ReconciliationSummary {
    pub fn from_rows(rows: &[ReconciliationRow]) -> Self {
        let count =
            |status: ReconciliationStatus| rows.iter().filter(|r| r.status == status).count();
        Self {
            total: rows.len(),
            matched: count(ReconciliationStatus::Matched),
            mismatched: count(ReconciliationStatus::Mismatch),
            only_in_subledger: count(ReconciliationStatus::OnlyInSubledger),
            only_in_gl: count(ReconciliationStatus::OnlyInGl),
            total_difference: rows.iter().map(|r| &r.difference).sum(),
        }
    }

    /// Every entity matched
    pub fn is_clean(&self) -> bool {
        self.matched == self.total
    }
}
