use crate::account_codec;
use crate::keys::{account_key, code_key, storage_key};
use async_trait::async_trait;
use revm::primitives::{AccountInfo, Address, Bytecode, B256, KECCAK_EMPTY, U256};
use revm::{Database, DatabaseRef};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use threepc_types::{BrokerError, Key, LockMode, Ticket, Value};

#[derive(Debug, Error, Clone)]
pub enum HostError {
    #[error(transparent)]
    Broker(#[from] BrokerError),

    #[error("no tokio runtime available to bridge a lock request")]
    NoRuntime,
}

/// The host's view of state access: acquire a lock on a key and read its
/// current value, or stage a write under a lock already held. Implemented
/// by whatever orchestrates tickets across shards (the broker); kept as a
/// trait here so this crate does not take a hard dependency on it.
#[async_trait]
pub trait StateAccess: Send + Sync {
    async fn lock_and_read(&self, ticket: Ticket, key: Key, mode: LockMode) -> Result<Value, BrokerError>;
}

/// Blocks on a future from synchronous code, bridging revm's synchronous
/// `DatabaseRef` callbacks over the broker's async lock acquisition. Must be
/// called from a context with a live tokio runtime handle (the agent task
/// that drives transaction execution).
fn block_on<F: std::future::Future>(fut: F) -> F::Output {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => tokio::task::block_in_place(|| handle.block_on(fut)),
        Err(_) => {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("failed to build fallback runtime for synchronous EVM host callback");
            rt.block_on(fut)
        }
    }
}

/// Upgrades every key in `keys` to a write lock. Called once execution has
/// produced its full state diff, since that is the first point at which the
/// keys actually mutated are known; a dry run never calls this; its reads
/// stay at whatever `LockMode` the cache originally acquired them under.
pub fn acquire_write_locks(
    access: &dyn StateAccess,
    ticket: Ticket,
    keys: impl Iterator<Item = Key>,
) -> Result<(), HostError> {
    for key in keys {
        block_on(access.lock_and_read(ticket, key, LockMode::Write))?;
    }
    Ok(())
}

/// Caches accounts, storage and code fetched (via shard locks) during a
/// single transaction's execution, and tracks EIP-2929 warm/cold access for
/// gas accounting purposes revm surfaces back through its own result.
pub struct StateCache<'a> {
    access: &'a dyn StateAccess,
    ticket: Ticket,
    accounts: RefCell<HashMap<Address, AccountInfo>>,
    storage: RefCell<HashMap<(Address, U256), U256>>,
    code: RefCell<HashMap<B256, Bytecode>>,
    accessed_addresses: RefCell<HashSet<Address>>,
    accessed_storage: RefCell<HashSet<(Address, U256)>>,
    block_hash: B256,
    block_number: u64,
}

impl<'a> StateCache<'a> {
    pub fn new(access: &'a dyn StateAccess, ticket: Ticket, block_hash: B256, block_number: u64) -> Self {
        Self {
            access,
            ticket,
            accounts: RefCell::new(HashMap::new()),
            storage: RefCell::new(HashMap::new()),
            code: RefCell::new(HashMap::new()),
            accessed_addresses: RefCell::new(HashSet::new()),
            accessed_storage: RefCell::new(HashSet::new()),
            block_hash,
            block_number,
        }
    }

    fn fetch_account(&self, addr: Address) -> Result<AccountInfo, HostError> {
        if let Some(info) = self.accounts.borrow().get(&addr) {
            return Ok(info.clone());
        }
        let value = block_on(self.access.lock_and_read(self.ticket, account_key(addr), LockMode::Read))?;
        let info = if value.is_absent() {
            AccountInfo::default()
        } else {
            account_codec::decode(value.as_bytes()).unwrap_or_default()
        };
        // Code is stored under the account's address, not its hash (see
        // `keys::code_key`), so it has to be fetched here, while the
        // address is still in hand, and cached by hash for revm's
        // `code_by_hash_ref` callback to find later.
        if info.code_hash != KECCAK_EMPTY && !self.code.borrow().contains_key(&info.code_hash) {
            let code_value = block_on(self.access.lock_and_read(self.ticket, code_key(addr), LockMode::Read))?;
            let code = if code_value.is_absent() {
                Bytecode::new()
            } else {
                Bytecode::new_raw(code_value.into_bytes().into())
            };
            self.code.borrow_mut().insert(info.code_hash, code);
        }
        self.accounts.borrow_mut().insert(addr, info.clone());
        self.accessed_addresses.borrow_mut().insert(addr);
        Ok(info)
    }

    pub fn was_accessed(&self, addr: &Address) -> bool {
        self.accessed_addresses.borrow().contains(addr)
    }

    pub fn was_storage_accessed(&self, addr: &Address, slot: &U256) -> bool {
        self.accessed_storage.borrow().contains(&(*addr, *slot))
    }
}

impl<'a> DatabaseRef for StateCache<'a> {
    type Error = HostError;

    fn basic_ref(&self, address: Address) -> Result<Option<AccountInfo>, Self::Error> {
        let info = self.fetch_account(address)?;
        if info == AccountInfo::default() {
            return Ok(None);
        }
        Ok(Some(info))
    }

    fn code_by_hash_ref(&self, code_hash: B256) -> Result<Bytecode, Self::Error> {
        // Code is keyed by address in the store (see `fetch_account`), so by
        // the time revm asks for it by hash it must already be cached —
        // `basic_ref` is always called first and primes this entry.
        Ok(self.code.borrow().get(&code_hash).cloned().unwrap_or_else(Bytecode::new))
    }

    fn storage_ref(&self, address: Address, index: U256) -> Result<U256, Self::Error> {
        if let Some(slot) = self.storage.borrow().get(&(address, index)) {
            return Ok(*slot);
        }
        let value = block_on(self.access.lock_and_read(
            self.ticket,
            storage_key(address, index),
            LockMode::Read,
        ))?;
        let slot = if value.is_absent() {
            U256::ZERO
        } else {
            U256::from_be_slice(value.as_bytes())
        };
        self.storage.borrow_mut().insert((address, index), slot);
        self.accessed_storage.borrow_mut().insert((address, index));
        Ok(slot)
    }

    fn block_hash_ref(&self, number: u64) -> Result<B256, Self::Error> {
        if number == self.block_number {
            Ok(self.block_hash)
        } else {
            Ok(B256::ZERO)
        }
    }
}

/// `revm::Evm` wants a `Database`, not a `DatabaseRef`; since every lookup
/// here is already cached behind a `RefCell`, the mutable-by-contract
/// `Database` methods just forward to their `_ref` counterparts.
impl<'a> Database for StateCache<'a> {
    type Error = HostError;

    fn basic(&mut self, address: Address) -> Result<Option<AccountInfo>, Self::Error> {
        self.basic_ref(address)
    }

    fn code_by_hash(&mut self, code_hash: B256) -> Result<Bytecode, Self::Error> {
        self.code_by_hash_ref(code_hash)
    }

    fn storage(&mut self, address: Address, index: U256) -> Result<U256, Self::Error> {
        self.storage_ref(address, index)
    }

    fn block_hash(&mut self, number: u64) -> Result<B256, Self::Error> {
        self.block_hash_ref(number)
    }
}
