//! Account mapping rules for automated postings

use tracing::{debug, info, warn};

use crate::traits::*;
use crate::types::*;

/// Resolves (module, operation, branch) to the debit/credit account pair
pub struct MappingResolver<S: LedgerStorage> {
    storage: S,
}

fn normalize_branch(branch_id: Option<&str>) -> Option<String> {
    branch_id
        .map(str::trim)
        .filter(|b| !b.is_empty())
        .map(str::to_string)
}

impl<S: LedgerStorage> MappingResolver<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Accounts for an automated event. An active mapping for the exact branch
    /// wins over the active wildcard (`branch_id = None`).
    pub async fn resolve_mapping(
        &self,
        module: &str,
        operation: &str,
        branch_id: Option<&str>,
    ) -> LedgerResult<ResolvedMapping> {
        let mut tx = self.storage.begin().await?;
        resolve_mapping_in(&mut tx, module, operation, branch_id).await
    }

    pub async fn create_mapping(&self, attrs: NewAccountMapping) -> LedgerResult<AccountMapping> {
        if attrs.module.trim().is_empty() || attrs.operation.trim().is_empty() {
            return Err(LedgerError::Validation(
                "Mapping module and operation cannot be empty".to_string(),
            ));
        }

        let now = chrono::Utc::now().naive_utc();
        let mapping = AccountMapping {
            id: MappingId::new(),
            module: attrs.module.trim().to_string(),
            operation: attrs.operation.trim().to_string(),
            branch_id: normalize_branch(attrs.branch_id.as_deref()),
            debit_account_id: attrs.debit_account_id,
            credit_account_id: attrs.credit_account_id,
            is_active: attrs.is_active,
            notes: attrs.notes,
            created_at: now,
            updated_at: now,
        };

        let mut tx = self.storage.begin().await?;
        check_accounts(&mut tx, &mapping).await?;
        check_unique(&mut tx, &mapping).await?;
        tx.insert_mapping(&mapping).await?;
        tx.commit().await?;

        info!(
            module = %mapping.module,
            operation = %mapping.operation,
            branch = ?mapping.branch_id,
            "account mapping created"
        );
        Ok(mapping)
    }

    pub async fn update_mapping(
        &self,
        id: MappingId,
        update: AccountMappingUpdate,
    ) -> LedgerResult<AccountMapping> {
        let mut tx = self.storage.begin().await?;
        let mut mapping = tx
            .get_mapping(id)
            .await?
            .ok_or_else(|| LedgerError::RecordNotFound(format!("mapping {id}")))?;

        let was_active = mapping.is_active;
        let accounts_before = (mapping.debit_account_id, mapping.credit_account_id);
        if let Some(debit) = update.debit_account_id {
            mapping.debit_account_id = debit;
        }
        if let Some(credit) = update.credit_account_id {
            mapping.credit_account_id = credit;
        }
        if let Some(is_active) = update.is_active {
            mapping.is_active = is_active;
        }
        if let Some(notes) = update.notes {
            mapping.notes = notes;
        }
        mapping.updated_at = chrono::Utc::now().naive_utc();

        // Accounts are rechecked only when they change or the mapping comes back
        // into use, so a mapping whose account became a header can still be retired.
        let accounts_changed =
            accounts_before != (mapping.debit_account_id, mapping.credit_account_id);
        let reactivated = mapping.is_active && !was_active;
        if accounts_changed || reactivated {
            check_accounts(&mut tx, &mapping).await?;
        }
        check_unique(&mut tx, &mapping).await?;
        tx.update_mapping(&mapping).await?;
        tx.commit().await?;

        info!(id = %mapping.id, active = mapping.is_active, "account mapping updated");
        Ok(mapping)
    }

    pub async fn deactivate_mapping(&self, id: MappingId) -> LedgerResult<AccountMapping> {
        self.update_mapping(
            id,
            AccountMappingUpdate {
                is_active: Some(false),
                ..AccountMappingUpdate::default()
            },
        )
        .await
    }

    /// Every mapping of a module/operation pair, active or not
    pub async fn list_mappings(
        &self,
        module: &str,
        operation: &str,
    ) -> LedgerResult<Vec<AccountMapping>> {
        self.storage
            .begin()
            .await?
            .list_mappings(module, operation)
            .await
    }
}

/// Mapping lookup against an open transaction
pub(crate) async fn resolve_mapping_in<T: StorageTransaction>(
    tx: &mut T,
    module: &str,
    operation: &str,
    branch_id: Option<&str>,
) -> LedgerResult<ResolvedMapping> {
    let branch = normalize_branch(branch_id);
    let active: Vec<AccountMapping> = tx
        .list_mappings(module, operation)
        .await?
        .into_iter()
        .filter(|m| m.is_active)
        .collect();

    let specific = branch
        .as_ref()
        .and_then(|b| active.iter().find(|m| m.branch_id.as_ref() == Some(b)));
    let chosen = specific.or_else(|| active.iter().find(|m| m.branch_id.is_none()));

    match chosen {
        Some(mapping) => {
            debug!(
                module,
                operation,
                branch = ?branch,
                wildcard = mapping.branch_id.is_none(),
                "mapping resolved"
            );
            Ok(ResolvedMapping {
                mapping_id: mapping.id,
                debit_account_id: mapping.debit_account_id,
                credit_account_id: mapping.credit_account_id,
            })
        }
        None => {
            warn!(module, operation, branch = ?branch, "no active mapping");
            Err(LedgerError::MappingNotFound {
                module: module.to_string(),
                operation: operation.to_string(),
                branch_id: branch,
            })
        }
    }
}

async fn check_accounts<T: StorageTransaction>(
    tx: &mut T,
    mapping: &AccountMapping,
) -> LedgerResult<()> {
    if mapping.debit_account_id == mapping.credit_account_id {
        return Err(LedgerError::Validation(
            "Mapping debit and credit accounts must differ".to_string(),
        ));
    }
    for id in [mapping.debit_account_id, mapping.credit_account_id] {
        let account = tx
            .get_account(id)
            .await?
            .ok_or_else(|| LedgerError::AccountNotFound(id.to_string()))?;
        if !account.is_postable() {
            return Err(LedgerError::HeaderAccountPosting(account.code));
        }
    }
    Ok(())
}

async fn check_unique<T: StorageTransaction>(
    tx: &mut T,
    mapping: &AccountMapping,
) -> LedgerResult<()> {
    if !mapping.is_active {
        return Ok(());
    }
    let clash = tx
        .list_mappings(&mapping.module, &mapping.operation)
        .await?
        .iter()
        .any(|other| other.id != mapping.id && other.is_active && other.same_key(mapping));
    if clash {
        warn!(module = %mapping.module, operation = %mapping.operation, "duplicate active mapping");
        return Err(LedgerError::DuplicateMapping {
            module: mapping.module.clone(),
            operation: mapping.operation.clone(),
            branch_id: mapping.branch_id.clone(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::memory_storage::MemoryStorage;

    async fn postable(storage: &MemoryStorage, code: &str) -> AccountId {
        let account = Account::new(
            NewAccount::new(code, code, AccountType::Asset, CurrencyCode::new("USD")),
            None,
        );
        let mut tx = storage.begin().await.unwrap();
        tx.insert_account(&account).await.unwrap();
        tx.commit().await.unwrap();
        account.id
    }

    #[tokio::test]
    async fn test_branch_beats_wildcard() {
        let storage = MemoryStorage::new();
        let cash = postable(&storage, "1110").await;
        let sales = postable(&storage, "4100").await;
        let branch_cash = postable(&storage, "1120").await;
        let resolver = MappingResolver::new(storage);

        let wildcard = resolver
            .create_mapping(NewAccountMapping::new("sales", "cash_sale", cash, sales))
            .await
            .unwrap();
        let branch = resolver
            .create_mapping(
                NewAccountMapping::new("sales", "cash_sale", branch_cash, sales).branch("B1"),
            )
            .await
            .unwrap();

        let resolved = resolver
            .resolve_mapping("sales", "cash_sale", Some("B1"))
            .await
            .unwrap();
        assert_eq!(resolved.mapping_id, branch.id);
        assert_eq!(resolved.debit_account_id, branch_cash);

        let resolved = resolver
            .resolve_mapping("sales", "cash_sale", Some("B2"))
            .await
            .unwrap();
        assert_eq!(resolved.mapping_id, wildcard.id);

        let resolved = resolver
            .resolve_mapping("sales", "cash_sale", Some("  "))
            .await
            .unwrap();
        assert_eq!(resolved.mapping_id, wildcard.id);
    }

    #[tokio::test]
    async fn test_duplicate_active_mapping_rejected() {
        let storage = MemoryStorage::new();
        let cash = postable(&storage, "1110").await;
        let sales = postable(&storage, "4100").await;
        let resolver = MappingResolver::new(storage);

        let first = resolver
            .create_mapping(NewAccountMapping::new("sales", "cash_sale", cash, sales).branch("B1"))
            .await
            .unwrap();
        let err = resolver
            .create_mapping(NewAccountMapping::new("sales", "cash_sale", cash, sales).branch("B1"))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::DuplicateMapping { .. }));

        // An inactive duplicate is fine, and becomes activatable once the first is retired
        let second = resolver
            .create_mapping(
                NewAccountMapping::new("sales", "cash_sale", cash, sales)
                    .branch("B1")
                    .inactive(),
            )
            .await
            .unwrap();
        let err = resolver
            .update_mapping(
                second.id,
                AccountMappingUpdate {
                    is_active: Some(true),
                    ..AccountMappingUpdate::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::DuplicateMapping { .. }));

        resolver.deactivate_mapping(first.id).await.unwrap();
        resolver
            .update_mapping(
                second.id,
                AccountMappingUpdate {
                    is_active: Some(true),
                    ..AccountMappingUpdate::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(resolver.list_mappings("sales", "cash_sale").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_mapping_to_converted_header_can_be_retired() {
        let storage = MemoryStorage::new();
        let cash = postable(&storage, "1100").await;
        let sales = postable(&storage, "4100").await;
        let till = postable(&storage, "1110").await;
        let resolver = MappingResolver::new(storage.clone());

        let mapping = resolver
            .create_mapping(NewAccountMapping::new("sales", "cash_sale", cash, sales))
            .await
            .unwrap();

        let mut tx = storage.begin().await.unwrap();
        let mut account = tx.get_account(cash).await.unwrap().unwrap();
        account.is_header = true;
        tx.update_account(&account).await.unwrap();
        tx.commit().await.unwrap();

        let notes_only = resolver
            .update_mapping(
                mapping.id,
                AccountMappingUpdate {
                    notes: Some(Some("cash account split".to_string())),
                    ..AccountMappingUpdate::default()
                },
            )
            .await
            .unwrap();
        assert!(notes_only.is_active);

        let retired = resolver.deactivate_mapping(mapping.id).await.unwrap();
        assert!(!retired.is_active);
        assert!(matches!(
            resolver.resolve_mapping("sales", "cash_sale", None).await,
            Err(LedgerError::MappingNotFound { .. })
        ));

        // Coming back into use still requires postable accounts
        let err = resolver
            .update_mapping(
                mapping.id,
                AccountMappingUpdate {
                    is_active: Some(true),
                    ..AccountMappingUpdate::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err, LedgerError::HeaderAccountPosting("1100".to_string()));

        let repointed = resolver
            .update_mapping(
                mapping.id,
                AccountMappingUpdate {
                    debit_account_id: Some(till),
                    is_active: Some(true),
                    ..AccountMappingUpdate::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(repointed.debit_account_id, till);
        assert!(repointed.is_active);
    }

    #[tokio::test]
    async fn test_missing_mapping_and_bad_accounts() {
        let storage = MemoryStorage::new();
        let cash = postable(&storage, "1110").await;
        let header = Account::new(
            NewAccount::new("4000", "Revenue", AccountType::Revenue, CurrencyCode::new("USD"))
                .header(),
            None,
        );
        let mut tx = storage.begin().await.unwrap();
        tx.insert_account(&header).await.unwrap();
        tx.commit().await.unwrap();
        let resolver = MappingResolver::new(storage);

        let err = resolver
            .resolve_mapping("purchases", "receive", None)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            LedgerError::MappingNotFound {
                module: "purchases".to_string(),
                operation: "receive".to_string(),
                branch_id: None,
            }
        );

        let err = resolver
            .create_mapping(NewAccountMapping::new("sales", "cash_sale", cash, header.id))
            .await
            .unwrap_err();
        assert_eq!(err, LedgerError::HeaderAccountPosting("4000".to_string()));

        let err = resolver
            .create_mapping(NewAccountMapping::new("sales", "cash_sale", cash, cash))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));

        let err = resolver
            .create_mapping(NewAccountMapping::new("sales", "cash_sale", cash, AccountId::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::AccountNotFound(_)));
    }
}
