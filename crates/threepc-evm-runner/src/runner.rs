use crate::error::RunnerError;
use crate::receipt::Receipt;
use revm::primitives::{
    BlockEnv, CfgEnv, CreateScheme, Env, ExecutionResult, Output, ResultAndState, TransactTo, TxEnv,
    B256, U256 as RU256,
};
use revm::EVM;
use threepc_evm_host::{state_updates, StateAccess, StateCache};
use threepc_txcodec::{Address, Transaction};
use threepc_types::{StateUpdates, Ticket};

const BASE_GAS: u64 = 21_000;
const CREATE_GAS: u64 = 32_000;
const GAS_PER_ZERO_BYTE: u64 = 4;
const GAS_PER_NONZERO_BYTE: u64 = 16;

/// The minimum gas a transaction must supply before execution even starts:
/// a flat base cost, a flat surcharge for contract creation, and a per-byte
/// calldata cost that charges more for non-zero bytes.
pub fn intrinsic_gas(tx: &Transaction) -> u64 {
    let mut gas = BASE_GAS;
    if tx.is_contract_creation() {
        gas += CREATE_GAS;
    }
    for &byte in &tx.data {
        gas += if byte == 0 { GAS_PER_ZERO_BYTE } else { GAS_PER_NONZERO_BYTE };
    }
    gas
}

pub struct ExecutionOutcome {
    pub receipt: Receipt,
    pub state_updates: StateUpdates,
}

fn to_revm_address(addr: &Address) -> revm::primitives::Address {
    revm::primitives::Address::from_slice(addr.as_bytes())
}

fn to_revm_u256(value: &threepc_u256::U256) -> RU256 {
    RU256::from_be_bytes(value.to_be_bytes())
}

fn build_env(
    tx: &Transaction,
    sender: &Address,
    chain_id: u64,
    block_number: u64,
) -> Env {
    let mut env = Env::default();
    env.cfg = CfgEnv::default();
    env.cfg.chain_id = chain_id;

    env.block = BlockEnv {
        number: RU256::from(block_number),
        ..BlockEnv::default()
    };

    let mut tx_env = TxEnv::default();
    tx_env.caller = to_revm_address(sender);
    tx_env.gas_limit = tx.gas_limit;
    tx_env.gas_price = tx
        .gas_price
        .or(tx.max_fee_per_gas)
        .map(|p| to_revm_u256(&p))
        .unwrap_or_default();
    tx_env.gas_priority_fee = tx.max_priority_fee_per_gas.map(|p| to_revm_u256(&p));
    tx_env.transact_to = match &tx.to {
        Some(to) => TransactTo::Call(to_revm_address(to)),
        None => TransactTo::Create(CreateScheme::Create),
    };
    tx_env.value = to_revm_u256(&tx.value);
    tx_env.data = tx.data.clone().into();
    tx_env.nonce = Some(tx.nonce);
    tx_env.chain_id = tx.chain_id;
    env.tx = tx_env;
    env
}

/// Runs a transaction to completion against shard-backed state, returning
/// both a receipt and the state writes to apply on commit. Synchronous:
/// the host bridges its lock-driven lookups over async internally, so the
/// caller should run this on a blocking-friendly task if invoked from an
/// async context.
///
/// `dry_run` runs the same EVM path but with caller-facing checks relaxed:
/// the nonce and gas-floor checks are skipped and the gas limit fed to the
/// interpreter is raised to `i64::MAX` rather than the caller's supplied
/// `gas_limit`, so `eth_call`/`eth_estimateGas` never fail on a limit that
/// was never meant to bound anything but a real submission. A dry run also
/// never escalates any key to a write lock and never records a transaction
/// or receipt entry, since the caller always rolls the ticket back.
pub fn execute_transaction(
    access: &dyn StateAccess,
    ticket: Ticket,
    tx: &Transaction,
    sender: Address,
    chain_id: u64,
    block_hash: B256,
    block_number: u64,
    dry_run: bool,
) -> Result<ExecutionOutcome, RunnerError> {
    let cache = StateCache::new(access, ticket, block_hash, block_number);

    let sender_info = {
        use revm::DatabaseRef;
        cache.basic_ref(to_revm_address(&sender))?
    };

    let expected_nonce = sender_info.as_ref().map(|i| i.nonce).unwrap_or(0);
    if !dry_run && tx.nonce != expected_nonce {
        return Err(RunnerError::NonceMismatch {
            expected: expected_nonce,
            got: tx.nonce,
        });
    }

    let floor = intrinsic_gas(tx);
    if !dry_run && tx.gas_limit < floor {
        return Err(RunnerError::InsufficientGas {
            limit: tx.gas_limit,
            intrinsic: floor,
        });
    }

    let mut env = build_env(tx, &sender, chain_id, block_number);
    if dry_run {
        env.tx.gas_limit = i64::MAX as u64;
    }
    let mut evm = EVM::with_env(env);
    evm.database(cache);

    let ResultAndState { state, result } = evm
        .transact_ref()
        .map_err(|err| RunnerError::Halted(format!("{:?}", err)))?;

    let tx_hash = B256::from(
        tx.encode()
            .map(|bytes| *threepc_txcodec::Hash::keccak256(&bytes).as_bytes())
            .map_err(|e| RunnerError::Codec(e.to_string()))?,
    );
    let receipt = build_receipt(tx_hash, result);

    if tx.to.is_none() {
        if let Some(actual) = receipt.contract_address {
            let derived = to_revm_address(&Address::contract_address(&sender, tx.nonce));
            if derived != actual {
                log::warn!(
                    "CREATE address derivation disagrees with revm: derived {derived:?}, revm computed {actual:?}"
                );
            }
        }
    }

    let mut updates = state_updates(&state);
    if !dry_run {
        if let Ok(encoded_tx) = tx.encode() {
            updates.insert(crate::selector::tx_key(tx_hash), threepc_types::Value::new(encoded_tx));
        }
        updates.insert(crate::selector::receipt_key(tx_hash), crate::selector::encode_receipt(&receipt));
        threepc_evm_host::acquire_write_locks(access, ticket, updates.keys().cloned())?;
    }

    Ok(ExecutionOutcome {
        receipt,
        state_updates: updates,
    })
}

fn build_receipt(tx_hash: B256, result: ExecutionResult) -> Receipt {
    match result {
        ExecutionResult::Success { gas_used, output, logs, .. } => {
            let (output_bytes, contract_address) = match output {
                Output::Call(bytes) => (bytes.to_vec(), None),
                Output::Create(bytes, addr) => (bytes.to_vec(), addr),
            };
            Receipt {
                tx_hash,
                success: true,
                gas_used,
                contract_address,
                output: output_bytes,
                logs,
            }
        }
        ExecutionResult::Revert { gas_used, output } => Receipt {
            tx_hash,
            success: false,
            gas_used,
            contract_address: None,
            output: output.to_vec(),
            logs: Vec::new(),
        },
        ExecutionResult::Halt { gas_used, .. } => Receipt {
            tx_hash,
            success: false,
            gas_used,
            contract_address: None,
            output: Vec::new(),
            logs: Vec::new(),
        },
    }
}
