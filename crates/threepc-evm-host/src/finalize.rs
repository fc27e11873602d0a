use crate::account_codec;
use crate::keys::{account_key, code_key, storage_key};
use revm::primitives::{Account, Address, State};
use threepc_types::{StateUpdates, Value};

/// Turns a revm state diff into the shard writes that materialize it.
///
/// A self-destructed account is tombstoned (its account record is written
/// as the empty value) but its storage and code records are left in place,
/// unreachable once the account record is gone — cheaper than a sweep over
/// every slot the account ever touched, and harmless since nothing can
/// address them without the account record to find the code hash from.
pub fn state_updates(state: &State) -> StateUpdates {
    let mut updates = StateUpdates::new();
    for (address, account) in state {
        apply_account(&mut updates, *address, account);
    }
    updates
}

fn apply_account(updates: &mut StateUpdates, address: Address, account: &Account) {
    if !account.is_touched() {
        return;
    }

    if account.is_selfdestructed() {
        updates.insert(account_key(address), Value::empty());
        return;
    }

    updates.insert(account_key(address), Value::new(account_codec::encode(&account.info)));

    if let Some(code) = &account.info.code {
        if !code.is_empty() {
            updates.insert(code_key(address), Value::new(code.bytes().to_vec()));
        }
    }

    for (slot, value) in &account.storage {
        if !value.is_changed() {
            continue;
        }
        updates.insert(
            storage_key(address, *slot),
            Value::new(value.present_value.to_be_bytes::<32>().to_vec()),
        );
    }
}
