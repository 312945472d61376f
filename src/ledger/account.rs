//! Chart of accounts management

use std::collections::{HashMap, HashSet, VecDeque};
use tracing::{debug, info, warn};

use crate::traits::*;
use crate::types::*;

/// Chart of accounts store: creation, partial updates, deactivation and tree reads
pub struct ChartOfAccounts<S: LedgerStorage> {
    storage: S,
    validator: Box<dyn AccountValidator>,
}

impl<S: LedgerStorage> ChartOfAccounts<S> {
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            validator: Box::new(DefaultAccountValidator),
        }
    }

    /// Create a chart of accounts with a custom validator
    pub fn with_validator(storage: S, validator: Box<dyn AccountValidator>) -> Self {
        Self { storage, validator }
    }

    /// Create an account under `parent` (or as a root when `None`).
    ///
    /// The new account only takes the parent relation; type, currency and
    /// header flag come from `attrs`.
    pub async fn create_account(
        &self,
        parent: Option<AccountId>,
        attrs: NewAccount,
    ) -> LedgerResult<Account> {
        attrs.validate()?;
        let account = Account::new(attrs, parent);
        self.validator.validate_account(&account)?;

        let mut tx = self.storage.begin().await?;

        if tx.find_account_by_code(&account.code).await?.is_some() {
            return Err(LedgerError::Validation(format!(
                "Account with code '{}' already exists",
                account.code
            )));
        }

        if let Some(parent_id) = parent {
            if tx.get_account(parent_id).await?.is_none() {
                return Err(LedgerError::AccountNotFound(parent_id.to_string()));
            }
        }

        tx.insert_account(&account).await?;
        tx.commit().await?;

        info!(
            code = %account.code,
            id = %account.id,
            header = account.is_header,
            "account created"
        );
        Ok(account)
    }

    /// Apply a partial update to an account
    pub async fn update_account(
        &self,
        id: AccountId,
        update: AccountUpdate,
    ) -> LedgerResult<Account> {
        let mut tx = self.storage.begin().await?;
        let mut account = tx
            .get_account(id)
            .await?
            .ok_or_else(|| LedgerError::AccountNotFound(id.to_string()))?;

        if let Some(ref code) = update.code {
            if code.trim() != account.code {
                if let Some(existing) = tx.find_account_by_code(code.trim()).await? {
                    if existing.id != id {
                        return Err(LedgerError::Validation(format!(
                            "Account with code '{}' already exists",
                            code.trim()
                        )));
                    }
                }
            }
        }

        let reparented = account.apply_update(update);
        if account.code.is_empty() || account.name.is_empty() {
            return Err(LedgerError::Validation(
                "Account code and name cannot be empty".to_string(),
            ));
        }
        self.validator.validate_account(&account)?;

        if reparented {
            if let Some(parent_id) = account.parent_id {
                let accounts = tx.list_accounts().await?;
                ensure_acyclic_parent(&account, parent_id, &accounts)?;
            }
        }

        tx.update_account(&account).await?;
        tx.commit().await?;

        info!(code = %account.code, id = %account.id, reparented, "account updated");
        Ok(account)
    }

    /// Deactivate an account. Never cascades: any active child blocks the call.
    pub async fn deactivate_account(&self, id: AccountId) -> LedgerResult<Account> {
        let mut tx = self.storage.begin().await?;
        let mut account = tx
            .get_account(id)
            .await?
            .ok_or_else(|| LedgerError::AccountNotFound(id.to_string()))?;

        if !account.is_active {
            return Ok(account);
        }

        let active_children = tx
            .list_accounts()
            .await?
            .into_iter()
            .filter(|a| a.parent_id == Some(id) && a.is_active)
            .count();
        if active_children > 0 {
            warn!(code = %account.code, active_children, "deactivation blocked");
            return Err(LedgerError::HasActiveChildren(account.code));
        }

        self.validator.validate_deactivation(&account)?;

        account.is_active = false;
        account.updated_at = chrono::Utc::now().naive_utc();
        tx.update_account(&account).await?;
        tx.commit().await?;

        info!(code = %account.code, id = %account.id, "account deactivated");
        Ok(account)
    }

    /// Reactivate a previously deactivated account
    pub async fn reactivate_account(&self, id: AccountId) -> LedgerResult<Account> {
        let mut tx = self.storage.begin().await?;
        let mut account = tx
            .get_account(id)
            .await?
            .ok_or_else(|| LedgerError::AccountNotFound(id.to_string()))?;

        if account.is_active {
            return Ok(account);
        }

        account.is_active = true;
        account.updated_at = chrono::Utc::now().naive_utc();
        tx.update_account(&account).await?;
        tx.commit().await?;

        info!(code = %account.code, id = %account.id, "account reactivated");
        Ok(account)
    }

    /// Get an account by ID
    pub async fn get_account(&self, id: AccountId) -> LedgerResult<Option<Account>> {
        self.storage.begin().await?.get_account(id).await
    }

    /// Get an account by ID, returning an error if not found
    pub async fn get_account_required(&self, id: AccountId) -> LedgerResult<Account> {
        self.get_account(id)
            .await?
            .ok_or_else(|| LedgerError::AccountNotFound(id.to_string()))
    }

    /// All accounts ordered by code
    pub async fn list_accounts(&self) -> LedgerResult<Vec<Account>> {
        self.storage.begin().await?.list_accounts().await
    }

    /// Rebuild the account hierarchy from the flat parent relation
    pub async fn list_tree(&self) -> LedgerResult<AccountTree> {
        let accounts = self.list_accounts().await?;
        let tree = AccountTree::build(accounts)?;
        debug!(accounts = tree.len(), roots = tree.roots.len(), "account tree built");
        Ok(tree)
    }

    /// Root-to-account chain of ancestors, ending with the account itself
    pub async fn account_path(&self, id: AccountId) -> LedgerResult<Vec<Account>> {
        let accounts: HashMap<AccountId, Account> = self
            .list_accounts()
            .await?
            .into_iter()
            .map(|a| (a.id, a))
            .collect();

        let mut path = Vec::new();
        let mut seen = HashSet::new();
        let mut current = Some(id);

        while let Some(current_id) = current {
            let account = accounts
                .get(&current_id)
                .ok_or_else(|| LedgerError::AccountNotFound(current_id.to_string()))?;
            if !seen.insert(current_id) {
                return Err(LedgerError::CycleDetected(account.code.clone()));
            }
            current = account.parent_id;
            path.push(account.clone());
        }

        path.reverse();
        Ok(path)
    }

    /// Whether any journal entry, in any status, has a line on the account.
    ///
    /// Callers use this to gate `is_header` changes.
    pub async fn has_postings(&self, id: AccountId) -> LedgerResult<bool> {
        let filter = EntryFilter {
            account_id: Some(id),
            ..EntryFilter::default()
        };
        let entries = self.storage.begin().await?.list_entries(&filter).await?;
        Ok(!entries.is_empty())
    }
}

/// Fail if making `parent_id` the parent of `account` would close a loop
fn ensure_acyclic_parent(
    account: &Account,
    parent_id: AccountId,
    accounts: &[Account],
) -> LedgerResult<()> {
    let parents: HashMap<AccountId, Option<AccountId>> =
        accounts.iter().map(|a| (a.id, a.parent_id)).collect();

    if !parents.contains_key(&parent_id) {
        return Err(LedgerError::AccountNotFound(parent_id.to_string()));
    }

    let mut current = Some(parent_id);
    let mut steps = 0usize;
    while let Some(id) = current {
        if id == account.id || steps > accounts.len() {
            return Err(LedgerError::CycleDetected(account.code.clone()));
        }
        current = parents.get(&id).copied().flatten();
        steps += 1;
    }
    Ok(())
}

/// One account in an [`AccountTree`]
#[derive(Debug, Clone, PartialEq)]
pub struct AccountNode {
    pub account: Account,
    /// Depth of the ancestor chain; roots are level 0
    pub level: usize,
    parent: Option<usize>,
    children: Vec<usize>,
}

/// Arena view of the chart of accounts.
///
/// Nodes live in one vector ordered by account code; the parent and children
/// indexes are derived once when the tree is built.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountTree {
    nodes: Vec<AccountNode>,
    roots: Vec<usize>,
    index: HashMap<AccountId, usize>,
}

impl AccountTree {
    /// Build the tree, failing with `CycleDetected` if the parent relation loops.
    /// Accounts whose parent is missing become roots.
    pub fn build(mut accounts: Vec<Account>) -> LedgerResult<Self> {
        accounts.sort_by(|a, b| a.code.cmp(&b.code));

        let index: HashMap<AccountId, usize> = accounts
            .iter()
            .enumerate()
            .map(|(i, a)| (a.id, i))
            .collect();

        let mut nodes: Vec<AccountNode> = accounts
            .into_iter()
            .map(|account| AccountNode {
                account,
                level: 0,
                parent: None,
                children: Vec::new(),
            })
            .collect();

        let mut roots = Vec::new();
        for i in 0..nodes.len() {
            match nodes[i].account.parent_id {
                None => roots.push(i),
                Some(parent_id) => match index.get(&parent_id) {
                    Some(&p) => {
                        nodes[i].parent = Some(p);
                        nodes[p].children.push(i);
                    }
                    None => {
                        warn!(
                            code = %nodes[i].account.code,
                            parent = %parent_id,
                            "parent account missing; treating as root"
                        );
                        roots.push(i);
                    }
                },
            }
        }

        // Breadth-first from the roots; anything left unvisited hangs off a cycle
        let mut visited = vec![false; nodes.len()];
        let mut queue: VecDeque<usize> = roots.iter().copied().collect();
        for &root in &roots {
            visited[root] = true;
        }
        while let Some(i) = queue.pop_front() {
            let level = nodes[i].level + 1;
            for k in 0..nodes[i].children.len() {
                let child = nodes[i].children[k];
                if !visited[child] {
                    visited[child] = true;
                    nodes[child].level = level;
                    queue.push_back(child);
                }
            }
        }

        if let Some(start) = visited.iter().position(|v| !v) {
            let mut seen = HashSet::new();
            let mut current = start;
            while seen.insert(current) {
                match nodes[current].parent {
                    Some(parent) => current = parent,
                    None => break,
                }
            }
            return Err(LedgerError::CycleDetected(nodes[current].account.code.clone()));
        }

        Ok(Self {
            nodes,
            roots,
            index,
        })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: AccountId) -> Option<&AccountNode> {
        self.index.get(&id).map(|&i| &self.nodes[i])
    }

    pub fn level(&self, id: AccountId) -> Option<usize> {
        self.get(id).map(|node| node.level)
    }

    pub fn roots(&self) -> impl Iterator<Item = &AccountNode> {
        self.roots.iter().map(|&i| &self.nodes[i])
    }

    pub fn parent(&self, id: AccountId) -> Option<&AccountNode> {
        let node = self.get(id)?;
        node.parent.map(|p| &self.nodes[p])
    }

    /// Direct children ordered by code
    pub fn children(&self, id: AccountId) -> Vec<&AccountNode> {
        match self.index.get(&id) {
            Some(&i) => self.nodes[i]
                .children
                .iter()
                .map(|&c| &self.nodes[c])
                .collect(),
            None => Vec::new(),
        }
    }

    /// The account and every account below it
    pub fn descendants(&self, id: AccountId) -> Vec<AccountId> {
        let Some(&start) = self.index.get(&id) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        let mut stack = vec![start];
        while let Some(i) = stack.pop() {
            out.push(self.nodes[i].account.id);
            stack.extend(self.nodes[i].children.iter().copied());
        }
        out
    }

    /// Nodes in display order: each parent followed by its subtree
    pub fn depth_first(&self) -> Vec<&AccountNode> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<usize> = self.roots.iter().rev().copied().collect();
        while let Some(i) = stack.pop() {
            out.push(&self.nodes[i]);
            stack.extend(self.nodes[i].children.iter().rev().copied());
        }
        out
    }
}
