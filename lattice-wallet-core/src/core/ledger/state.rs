use async_trait::async_trait;
use futures::future::try_join_all;
use log::{debug, error, info, warn};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use super::events::{FeedOutcome, LedgerEvent, LedgerSettings, LedgerSnapshot, ReloadOutcome};
use crate::core::blocks::{BlockBuilder, Operation, SubmittedBlock};
use crate::core::crypto::keys::encode_address;
use crate::core::crypto::signer::BlockSigner;
use crate::core::feed::{ConfirmationMessage, FeedEvent, RealtimeFeed};
use crate::core::gateway::{AccountBalance, AccountInfo, BackendGateway, ReceivableEntry};
use crate::core::receivable::{QueueRun, ReceivableQueue, ReceiveContext};
use crate::core::work::WorkCache;
use crate::domain::entities::{Account, ReceivableBlock, Wallet};
use crate::shared::constants::EVENT_CHANNEL_CAPACITY;
use crate::shared::error::WalletError;
use crate::shared::types::{Address, BlockHash, BlockSubtype, DifficultyTier, Raw, ReceivePolicy, WalletId};
use crate::shared::utils::FlagGuard;
use crate::shared::WalletResult;

struct HeldWallet {
    wallet: Wallet,
    signer: Option<Arc<dyn BlockSigner>>,
    /// Serializes send/change/receive submissions for this wallet
    submissions: Arc<tokio::sync::Mutex<()>>,
}

impl HeldWallet {
    fn unlocked_signer(&self) -> Option<Arc<dyn BlockSigner>> {
        match &self.signer {
            Some(signer) if !self.wallet.locked => Some(signer.clone()),
            _ => None,
        }
    }
}

#[derive(Default)]
struct LedgerInner {
    wallets: BTreeMap<WalletId, HeldWallet>,
    active: Option<WalletId>,
    policy: ReceivePolicy,
    balance: Raw,
    receivable: Raw,
    /// Receivables claimed locally that the node may still report
    applied: HashSet<BlockHash>,
    /// Blocks submitted from here whose feed confirmation is still due
    local_blocks: HashSet<BlockHash>,
    /// Bumped on every local change to an account's chain or receivables
    revisions: HashMap<Address, u64>,
}

impl LedgerInner {
    fn holder_of(&self, address: &str) -> Option<&HeldWallet> {
        self.wallets.values().find(|held| held.wallet.owns(address))
    }

    fn accounts(&self) -> impl Iterator<Item = &Account> {
        self.wallets.values().flat_map(|held| held.wallet.accounts.iter())
    }

    fn touch(&mut self, address: &str) {
        *self.revisions.entry(address.to_string()).or_default() += 1;
    }
}

/// Everything a submission needs, captured under the state lock
struct Submission {
    wallet_id: WalletId,
    account: Account,
    signer: Arc<dyn BlockSigner>,
    lock: Arc<tokio::sync::Mutex<()>>,
}

/// Results of one reconciliation round, merged only once all have resolved
struct Fetched {
    balances: HashMap<Address, AccountBalance>,
    frontiers: HashMap<Address, BlockHash>,
    receivable: HashMap<Address, Vec<ReceivableEntry>>,
    infos: HashMap<Address, AccountInfo>,
    timestamps: HashMap<BlockHash, u64>,
}

pub struct AccountLedgerState {
    gateway: Arc<BackendGateway>,
    work: Arc<WorkCache>,
    builder: BlockBuilder,
    feed: Option<Arc<RealtimeFeed>>,
    queue: ReceivableQueue,
    settings: LedgerSettings,
    state: Mutex<LedgerInner>,
    reloading: AtomicBool,
    /// Bumped whenever the wallet or account set changes
    context_epoch: AtomicU64,
    events: broadcast::Sender<LedgerEvent>,
}

impl AccountLedgerState {
    pub fn new(
        gateway: Arc<BackendGateway>,
        work: Arc<WorkCache>,
        builder: BlockBuilder,
        feed: Option<Arc<RealtimeFeed>>,
        settings: LedgerSettings,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let state = LedgerInner { policy: settings.receive_policy, ..LedgerInner::default() };
        Self {
            gateway,
            work,
            builder,
            feed,
            queue: ReceivableQueue::new(settings.receive_batch_delay),
            settings,
            state: Mutex::new(state),
            reloading: AtomicBool::new(false),
            context_epoch: AtomicU64::new(0),
            events,
        }
    }

    fn state(&self) -> MutexGuard<'_, LedgerInner> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: LedgerEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn bump_epoch(&self) {
        self.context_epoch.fetch_add(1, Ordering::SeqCst);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.events.subscribe()
    }

    pub fn policy(&self) -> ReceivePolicy {
        self.state().policy
    }

    pub fn account(&self, address: &str) -> Option<Account> {
        self.state().accounts().find(|account| account.address == address).cloned()
    }

    /// Pending receivables in the order the queue would claim them
    pub fn receivables(&self) -> Vec<ReceivableBlock> {
        self.queue.pending(self.policy())
    }

    pub fn is_receiving_suspended(&self) -> bool {
        self.queue.is_suspended()
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        let state = self.state();
        LedgerSnapshot {
            wallets: state.wallets.values().map(|held| held.wallet.clone()).collect(),
            active_wallet: state.active.clone(),
            balance: state.balance,
            receivable: state.receivable,
            policy: state.policy,
            node_status: self.gateway.status(),
        }
    }

    /// Held addresses and their revisions as a reload starts
    fn reload_context(&self) -> (Vec<Address>, HashMap<Address, u64>) {
        let state = self.state();
        let addresses = state.accounts().map(|account| account.address.clone()).collect();
        (addresses, state.revisions.clone())
    }

    fn update_totals(&self, state: &mut LedgerInner) {
        let (balance, receivable) = state
            .accounts()
            .fold((0u128, 0u128), |(b, r), account| {
                (b.saturating_add(account.balance), r.saturating_add(account.receivable))
            });
        state.balance = balance;
        state.receivable = receivable;
        self.emit(LedgerEvent::BalancesUpdated { balance, receivable });
    }

    fn feed_subscribe(&self, addresses: &[Address]) {
        if let Some(feed) = &self.feed {
            feed.subscribe_accounts(addresses);
        }
    }

    fn feed_unsubscribe(&self, addresses: &[Address]) {
        if let Some(feed) = &self.feed {
            feed.unsubscribe_accounts(addresses);
        }
    }

    /// Signer of an unlocked wallet
    pub fn signer(&self, wallet_id: &str) -> WalletResult<Arc<dyn BlockSigner>> {
        let state = self.state();
        let held = state
            .wallets
            .get(wallet_id)
            .ok_or_else(|| WalletError::wallet_not_found(wallet_id))?;
        held.signer.clone().ok_or_else(|| WalletError::wallet_locked(wallet_id))
    }

    // Wallet and account set maintenance

    /// Hold `wallet`. It is unlocked exactly when a signer is supplied.
    pub fn add_wallet(&self, mut wallet: Wallet, signer: Option<Arc<dyn BlockSigner>>) -> WalletResult<()> {
        let addresses: Vec<Address> = wallet.accounts.iter().map(|a| a.address.clone()).collect();
        let activated = {
            let mut state = self.state();
            if state.wallets.contains_key(&wallet.id) {
                return Err(WalletError::wallet_already_exists(wallet.id));
            }
            wallet.set_locked(signer.is_none());
            let id = wallet.id.clone();
            info!("Holding wallet {} with {} accounts", id, wallet.accounts.len());
            state.wallets.insert(
                id.clone(),
                HeldWallet { wallet, signer, submissions: Arc::new(tokio::sync::Mutex::new(())) },
            );
            self.update_totals(&mut state);
            if state.active.is_none() {
                state.active = Some(id.clone());
                Some(id)
            } else {
                None
            }
        };

        self.bump_epoch();
        self.feed_subscribe(&addresses);
        if let Some(id) = activated {
            self.emit(LedgerEvent::ActiveWalletChanged(Some(id)));
        }
        Ok(())
    }

    pub fn remove_wallet(&self, wallet_id: &str) -> WalletResult<Wallet> {
        let (wallet, active_changed) = {
            let mut state = self.state();
            let held = state
                .wallets
                .remove(wallet_id)
                .ok_or_else(|| WalletError::wallet_not_found(wallet_id))?;
            let active_changed = state.active.as_deref() == Some(wallet_id);
            if active_changed {
                state.active = state.wallets.keys().next().cloned();
            }
            self.update_totals(&mut state);
            (held.wallet, active_changed.then(|| state.active.clone()))
        };

        self.bump_epoch();
        let addresses: Vec<Address> = wallet.accounts.iter().map(|a| a.address.clone()).collect();
        for address in &addresses {
            self.queue.remove_account(address);
        }
        self.feed_unsubscribe(&addresses);
        if let Some(active) = active_changed {
            self.emit(LedgerEvent::ActiveWalletChanged(active));
        }
        Ok(wallet)
    }

    pub fn add_account(&self, wallet_id: &str, account: Account) -> WalletResult<()> {
        let address = account.address.clone();
        {
            let mut state = self.state();
            if state.holder_of(&address).is_some() {
                return Err(WalletError::validation(format!("Account {} is already held", address)));
            }
            let held = state
                .wallets
                .get_mut(wallet_id)
                .ok_or_else(|| WalletError::wallet_not_found(wallet_id))?;
            held.wallet.add_account(account)?;
            self.update_totals(&mut state);
        }
        self.bump_epoch();
        self.feed_subscribe(&[address]);
        Ok(())
    }

    /// Stop tracking an account; its receivables and feed subscription go too
    pub fn remove_account(&self, wallet_id: &str, address: &str) -> WalletResult<Account> {
        let account = {
            let mut state = self.state();
            let held = state
                .wallets
                .get_mut(wallet_id)
                .ok_or_else(|| WalletError::wallet_not_found(wallet_id))?;
            let account = held
                .wallet
                .remove_account(address)
                .ok_or_else(|| WalletError::account_not_found(address))?;
            self.update_totals(&mut state);
            account
        };
        self.bump_epoch();
        for dropped in self.queue.remove_account(address) {
            self.emit(LedgerEvent::ReceivableDropped(dropped.hash));
        }
        self.feed_unsubscribe(&[address.to_string()]);
        Ok(account)
    }

    pub fn set_active_wallet(&self, wallet_id: &str) -> WalletResult<()> {
        {
            let mut state = self.state();
            if !state.wallets.contains_key(wallet_id) {
                return Err(WalletError::wallet_not_found(wallet_id));
            }
            if state.active.as_deref() == Some(wallet_id) {
                return Ok(());
            }
            state.active = Some(wallet_id.to_string());
        }
        self.emit(LedgerEvent::ActiveWalletChanged(Some(wallet_id.to_string())));
        Ok(())
    }

    /// Drop the wallet's signer. In-flight receive runs stop at their next checkpoint.
    pub fn lock_wallet(&self, wallet_id: &str) -> WalletResult<()> {
        {
            let mut state = self.state();
            let held = state
                .wallets
                .get_mut(wallet_id)
                .ok_or_else(|| WalletError::wallet_not_found(wallet_id))?;
            held.signer = None;
            held.wallet.set_locked(true);
        }
        self.bump_epoch();
        info!("Wallet {} locked", wallet_id);
        self.emit(LedgerEvent::WalletLocked(wallet_id.to_string()));
        Ok(())
    }

    /// Install the signer produced by unlocking and claim what is pending
    pub async fn unlock_wallet(&self, wallet_id: &str, signer: Arc<dyn BlockSigner>) -> WalletResult<QueueRun> {
        {
            let mut state = self.state();
            let held = state
                .wallets
                .get_mut(wallet_id)
                .ok_or_else(|| WalletError::wallet_not_found(wallet_id))?;
            held.signer = Some(signer);
            held.wallet.set_locked(false);
        }
        info!("Wallet {} unlocked", wallet_id);
        self.emit(LedgerEvent::WalletUnlocked(wallet_id.to_string()));
        Ok(self.drain_receivables().await)
    }

    pub async fn set_receive_policy(&self, policy: ReceivePolicy) -> QueueRun {
        self.state().policy = policy;
        debug!("Receive policy set to {:?}", policy);
        self.drain_receivables().await
    }

    /// Lift a suspension caused by a denied hardware signature
    pub async fn resume_receiving(&self) -> QueueRun {
        self.queue.resume();
        self.drain_receivables().await
    }

    // Reconciliation

    /// Refresh every held account from the node. Coalesces with a reload
    /// already in flight instead of queueing behind it.
    pub async fn reload_balances(&self) -> ReloadOutcome {
        if self.reloading.swap(true, Ordering::SeqCst) {
            debug!("Balance reload already in flight");
            return ReloadOutcome::Coalesced;
        }
        let outcome = {
            let _guard = FlagGuard(&self.reloading);
            self.reload_once().await
        };

        if let ReloadOutcome::Completed { new_receivables } = outcome {
            if new_receivables > 0 {
                self.drain_receivables().await;
            }
        }
        outcome
    }

    async fn reload_once(&self) -> ReloadOutcome {
        let epoch = self.context_epoch.load(Ordering::SeqCst);
        let (addresses, revisions) = self.reload_context();
        if addresses.is_empty() {
            return ReloadOutcome::Completed { new_receivables: 0 };
        }

        let fetched = match self.fetch(&addresses).await {
            Ok(fetched) => fetched,
            Err(WalletError::Offline(reason)) => {
                warn!("Balance reload skipped, node offline: {}", reason);
                return ReloadOutcome::Offline;
            }
            Err(e) => {
                error!("Balance reload failed: {}", e);
                return ReloadOutcome::Failed(e);
            }
        };

        if self.context_epoch.load(Ordering::SeqCst) != epoch {
            debug!("Accounts changed during reload, discarding results");
            return ReloadOutcome::Stale;
        }
        let new_receivables = self.merge(fetched, &revisions);
        ReloadOutcome::Completed { new_receivables }
    }

    async fn fetch(&self, addresses: &[Address]) -> WalletResult<Fetched> {
        let infos = try_join_all(addresses.iter().map(|address| async move {
            let info = self.gateway.account_info(address).await?;
            Ok::<_, WalletError>((address.clone(), info))
        }));

        let (balances, frontiers, receivable, infos) = tokio::try_join!(
            self.gateway.accounts_balances(addresses),
            self.gateway.accounts_frontiers(addresses),
            self.gateway.accounts_receivable(
                addresses,
                self.settings.minimum_receive,
                self.settings.receivable_fetch_count,
            ),
            infos,
        )?;

        let mut timestamps = HashMap::new();
        if self.policy() == ReceivePolicy::Date {
            let unknown: Vec<BlockHash> = receivable
                .values()
                .flatten()
                .map(|entry| entry.hash)
                .filter(|hash| !self.queue.contains(hash))
                .collect();
            if !unknown.is_empty() {
                for (hash, info) in self.gateway.blocks_info(&unknown).await? {
                    if let Some(timestamp) = info.local_timestamp {
                        timestamps.insert(hash, timestamp);
                    }
                }
            }
        }

        Ok(Fetched {
            balances,
            frontiers,
            receivable,
            infos: infos.into_iter().filter_map(|(a, info)| info.map(|info| (a, info))).collect(),
            timestamps,
        })
    }

    /// Apply a completed fetch round. Returns how many receivables are new.
    /// Accounts changed locally since `revisions` was captured keep their
    /// local state; the node's answer for them predates that change.
    fn merge(&self, fetched: Fetched, revisions: &HashMap<Address, u64>) -> usize {
        let minimum = self.settings.minimum_receive;
        let mut new_blocks = Vec::new();
        let mut roots = Vec::new();
        {
            let mut state = self.state();
            let moved: HashSet<Address> = state
                .accounts()
                .map(|account| account.address.clone())
                .filter(|address| state.revisions.get(address) != revisions.get(address))
                .collect();
            if !moved.is_empty() {
                debug!("{} accounts changed during reload, keeping their local state", moved.len());
            }

            let reported: HashSet<BlockHash> = fetched.receivable.values().flatten().map(|e| e.hash).collect();
            state.applied.retain(|hash| reported.contains(hash));

            let mut observed: HashMap<BlockHash, ReceivableBlock> = HashMap::new();
            for (address, entries) in &fetched.receivable {
                for entry in entries {
                    if entry.amount < minimum || state.applied.contains(&entry.hash) {
                        continue;
                    }
                    let block = ReceivableBlock::new(
                        entry.hash,
                        address.clone(),
                        entry.amount,
                        entry.source.clone().unwrap_or_default(),
                    )
                    .with_timestamp(fetched.timestamps.get(&entry.hash).copied());
                    observed.insert(entry.hash, block);
                }
            }

            let keep = |block: &ReceivableBlock| {
                observed.contains_key(&block.hash) || moved.contains(&block.destination)
            };
            for dropped in self.queue.retain(keep) {
                self.emit(LedgerEvent::ReceivableDropped(dropped.hash));
            }
            let mut incoming: Vec<ReceivableBlock> = observed.into_values().collect();
            incoming.sort_by(|a, b| b.amount.cmp(&a.amount));
            for block in incoming {
                let hash = block.hash;
                if self.queue.insert(block) {
                    if let Some(block) = self.queue.get(&hash) {
                        new_blocks.push(block);
                    }
                }
            }

            let pending = self.queue.pending(ReceivePolicy::Manual);
            for held in state.wallets.values_mut() {
                for account in held.wallet.accounts.iter_mut() {
                    if moved.contains(&account.address) {
                        continue;
                    }
                    if let Some(balance) = fetched.balances.get(&account.address) {
                        account.balance = balance.balance;
                    }
                    let info = fetched.infos.get(&account.address);
                    account.frontier = fetched
                        .frontiers
                        .get(&account.address)
                        .copied()
                        .or_else(|| info.map(|info| info.frontier));
                    if let Some(representative) = info.and_then(|info| info.representative.clone()) {
                        account.representative = Some(representative);
                    }
                    account.receivable = pending
                        .iter()
                        .filter(|block| block.destination == account.address)
                        .map(|block| block.amount)
                        .sum();

                    let root = account.work_root();
                    if !self.work.has(&root, DifficultyTier::Full) {
                        roots.push(root);
                    }
                }
            }
            self.update_totals(&mut state);
        }

        for root in roots {
            self.work.precompute(root, DifficultyTier::Full);
        }
        info!("Balances reloaded, {} new receivable blocks", new_blocks.len());
        let count = new_blocks.len();
        for block in new_blocks {
            self.emit(LedgerEvent::Receivable(block));
        }
        count
    }

    // Submissions

    fn submission(&self, address: &str) -> WalletResult<Submission> {
        let state = self.state();
        let held = state
            .holder_of(address)
            .ok_or_else(|| WalletError::account_not_found(address))?;
        let account = held
            .wallet
            .account(address)
            .cloned()
            .ok_or_else(|| WalletError::account_not_found(address))?;
        let signer = held
            .unlocked_signer()
            .ok_or_else(|| WalletError::wallet_locked(held.wallet.id.clone()))?;
        Ok(Submission {
            wallet_id: held.wallet.id.clone(),
            account,
            signer,
            lock: held.submissions.clone(),
        })
    }

    async fn submit(&self, address: &str, operation: Operation) -> WalletResult<SubmittedBlock> {
        let lock = self.submission(address)?.lock;
        let _permit = lock.lock().await;
        // Re-read after waiting: an earlier submission may have moved the frontier
        let ctx = self.submission(address)?;

        let consumed = match &operation {
            Operation::Receive { source, .. } => Some(*source),
            _ => None,
        };
        let submitted = self
            .builder
            .build_and_submit(&ctx.account, operation, ctx.signer.as_ref())
            .await?;
        self.apply_submitted(&ctx.wallet_id, address, &submitted, consumed)?;
        Ok(submitted)
    }

    fn apply_submitted(
        &self,
        wallet_id: &str,
        address: &str,
        submitted: &SubmittedBlock,
        consumed: Option<BlockHash>,
    ) -> WalletResult<()> {
        {
            let mut state = self.state();
            state.local_blocks.insert(submitted.hash);
            state.touch(address);
            if let Some(source) = consumed {
                state.applied.insert(source);
                self.queue.remove(&source);
            }

            let account = state
                .wallets
                .get_mut(wallet_id)
                .and_then(|held| held.wallet.account_mut(address))
                .ok_or_else(|| WalletError::stale(format!("{} left the wallet during submission", address)))?;
            account.balance = submitted.block.balance;
            account.frontier = Some(submitted.hash);
            account.representative = Some(encode_address(&submitted.block.representative));
            if consumed.is_some() {
                account.receivable = account.receivable.saturating_sub(submitted.amount);
            }
            self.update_totals(&mut state);
        }
        self.emit(LedgerEvent::BlockSubmitted {
            account: address.to_string(),
            hash: submitted.hash,
            subtype: submitted.subtype,
        });
        Ok(())
    }

    pub async fn send(&self, from: &str, destination: &str, amount: Raw) -> WalletResult<SubmittedBlock> {
        let operation = Operation::Send { destination: destination.to_string(), amount };
        self.submit(from, operation).await
    }

    pub async fn change_representative(&self, address: &str, representative: &str) -> WalletResult<SubmittedBlock> {
        let operation = Operation::Change { representative: representative.to_string() };
        self.submit(address, operation).await
    }

    /// Explicit receive of one pending block, under any policy and even
    /// when the entry was parked after repeated failures
    pub async fn receive_block(&self, hash: &BlockHash) -> WalletResult<SubmittedBlock> {
        let entry = self
            .queue
            .get(hash)
            .ok_or_else(|| WalletError::validation(format!("No receivable block {}", hash)))?;
        let operation = Operation::Receive { source: entry.hash, amount: entry.amount };
        self.submit(&entry.destination, operation).await
    }

    /// Run the receivable queue against this ledger
    pub async fn drain_receivables(&self) -> QueueRun {
        let run = self.queue.process(self).await;
        match &run {
            QueueRun::Halted { error, .. } => self.emit(LedgerEvent::ReceiveFailed(error.clone())),
            QueueRun::Suspended { .. } => self.emit(LedgerEvent::ReceivingSuspended),
            _ => {}
        }
        run
    }

    // Feed

    pub async fn handle_feed_event(&self, event: &FeedEvent) -> FeedOutcome {
        match event {
            // Anything confirmed while disconnected was missed
            FeedEvent::Connected => FeedOutcome::Reloaded(self.reload_balances().await),
            FeedEvent::Disconnected => FeedOutcome::Ignored,
            FeedEvent::Confirmation(message) => self.apply_confirmation(message).await,
        }
    }

    async fn apply_confirmation(&self, message: &ConfirmationMessage) -> FeedOutcome {
        let (incoming, foreign_block) = {
            let mut state = self.state();
            let foreign_block =
                state.holder_of(&message.account).is_some() && !state.local_blocks.remove(&message.hash);

            let destination = match (message.subtype, &message.link_as_account) {
                (Some(BlockSubtype::Send), Some(destination)) if state.holder_of(destination).is_some() => {
                    Some(destination.clone())
                }
                _ => None,
            };

            let incoming = match destination {
                Some(_) if self.queue.contains(&message.hash) || state.applied.contains(&message.hash) => {
                    Err(FeedOutcome::Duplicate)
                }
                Some(_) if message.amount < self.settings.minimum_receive => Err(FeedOutcome::Ignored),
                Some(destination) => {
                    let block = ReceivableBlock::new(
                        message.hash,
                        destination.clone(),
                        message.amount,
                        message.account.clone(),
                    )
                    .with_timestamp(message.timestamp);
                    self.queue.insert(block);
                    state.touch(&destination);
                    if let Some(account) = state
                        .wallets
                        .values_mut()
                        .find_map(|held| held.wallet.account_mut(&destination))
                    {
                        account.receivable = account.receivable.saturating_add(message.amount);
                    }
                    self.update_totals(&mut state);
                    self.queue.get(&message.hash).ok_or(FeedOutcome::Ignored)
                }
                None => Err(FeedOutcome::Ignored),
            };
            (incoming, foreign_block)
        };

        let reload = if foreign_block {
            debug!("Confirmation {} on a held account was not produced here", message.hash);
            Some(self.reload_balances().await)
        } else {
            None
        };

        match (incoming, reload) {
            (Ok(block), _) => {
                info!("Receivable {} of {} raw for {}", block.hash, block.amount, block.destination);
                self.emit(LedgerEvent::Receivable(block.clone()));
                self.drain_receivables().await;
                FeedOutcome::Receivable(block)
            }
            (Err(_), Some(outcome)) => FeedOutcome::Reloaded(outcome),
            (Err(outcome), None) => outcome,
        }
    }

    /// Apply feed events as they arrive until the feed goes away
    pub fn spawn_feed_listener(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        let mut events = self.feed.as_ref()?.events();
        let ledger = Arc::clone(self);
        Some(tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        ledger.handle_feed_event(&event).await;
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!("Feed listener lagged by {} events, reloading", missed);
                        ledger.reload_balances().await;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }))
    }
}

#[async_trait]
impl ReceiveContext for AccountLedgerState {
    fn policy(&self) -> ReceivePolicy {
        AccountLedgerState::policy(self)
    }

    fn can_receive(&self, entry: &ReceivableBlock) -> bool {
        self.state()
            .holder_of(&entry.destination)
            .is_some_and(|held| held.unlocked_signer().is_some())
    }

    async fn receive(&self, entry: &ReceivableBlock) -> WalletResult<BlockHash> {
        let operation = Operation::Receive { source: entry.hash, amount: entry.amount };
        let submitted = match self.submit(&entry.destination, operation).await {
            Ok(submitted) => submitted,
            Err(WalletError::AccountNotFound(reason)) | Err(WalletError::WalletLocked(reason)) => {
                return Err(WalletError::stale(reason));
            }
            Err(e) => return Err(e),
        };
        self.reload_balances().await;
        Ok(submitted.hash)
    }
}
