//! Wire shapes returned by an Ethereum JSON-RPC node, plus their conversion
//! into the domain model.

use job_watch_domain::ports::{ConnectivityError, SourceResult};
use job_watch_domain::{Address, Block, Transaction};
use serde::Deserialize;

/// Block object from `eth_getBlockByNumber(.., true)`.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcBlock {
    pub number: String,
    #[serde(default)]
    pub transactions: Vec<RpcTransaction>,
}

/// Full transaction object embedded in an [`RpcBlock`].
#[derive(Debug, Clone, Deserialize)]
pub struct RpcTransaction {
    pub hash: String,
    /// `null` for contract creation.
    #[serde(default)]
    pub to: Option<String>,
    /// Call data. Some nodes name it `data`, some send both keys.
    #[serde(default)]
    pub input: Option<String>,
    #[serde(default)]
    pub data: Option<String>,
}

/// Parses a `0x`-prefixed hex quantity such as `0x1b4`.
pub fn parse_quantity(method: &str, value: &str) -> SourceResult<u64> {
    let digits = value.strip_prefix("0x").unwrap_or(value);
    if digits.is_empty() {
        return Err(ConnectivityError::invalid(method, "empty hex quantity"));
    }
    u64::from_str_radix(digits, 16).map_err(|err| {
        ConnectivityError::invalid(method, format!("bad quantity `{value}`: {err}"))
    })
}

/// Decodes `0x`-prefixed hex data into raw bytes.
pub fn decode_data(method: &str, value: &str) -> SourceResult<Vec<u8>> {
    let digits = value.strip_prefix("0x").unwrap_or(value);
    hex::decode(digits)
        .map_err(|err| ConnectivityError::invalid(method, format!("bad hex data: {err}")))
}

pub fn convert_block(method: &str, block: RpcBlock) -> SourceResult<Block> {
    let number = parse_quantity(method, &block.number)?;
    let transactions = block
        .transactions
        .into_iter()
        .map(|tx| convert_transaction(method, tx))
        .collect::<SourceResult<Vec<_>>>()?;
    Ok(Block::new(number, transactions))
}

fn convert_transaction(method: &str, tx: RpcTransaction) -> SourceResult<Transaction> {
    let data = match tx.input.as_deref().or(tx.data.as_deref()) {
        Some(raw) => decode_data(method, raw)?,
        None => Vec::new(),
    };
    Ok(Transaction::new(tx.hash, tx.to.map(Address::new), data))
}

/// Rejects a block whose number differs from the height that was requested.
pub fn ensure_height(method: &str, requested: u64, block: Block) -> SourceResult<Block> {
    if block.number != requested {
        return Err(ConnectivityError::invalid(
            method,
            format!("requested block {requested}, node returned {}", block.number),
        ));
    }
    Ok(block)
}
