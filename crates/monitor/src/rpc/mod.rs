use std::sync::Arc;

use async_trait::async_trait;
use futures::future::try_join_all;
use job_watch_domain::ports::{
    ChainReader, ConnectivityError, SourceResult, WhitelistSource,
};
use job_watch_domain::{Address, Block, Selector};
use serde_json::json;
use tracing::debug;

use crate::client::JsonRpcClient;

mod types;

pub use types::{
    convert_block, decode_data, ensure_height, parse_quantity, RpcBlock, RpcTransaction,
};

/// `numJobs()`
pub const NUM_JOBS_SELECTOR: Selector = Selector::new([0x92, 0x12, 0x05, 0x1c]);
/// `jobAt(uint256)`
pub const JOB_AT_SELECTOR: Selector = Selector::new([0xb3, 0x6a, 0x56, 0xad]);

/// Upper bound on `numJobs()` accepted from the registry; one `eth_call` is
/// issued per job.
pub const MAX_JOBS: u64 = 10_000;

const WORD: usize = 32;

/// Reads heads and blocks over `eth_blockNumber` / `eth_getBlockByNumber`.
#[derive(Clone)]
pub struct RpcChainReader {
    client: Arc<JsonRpcClient>,
}

impl RpcChainReader {
    pub fn new(client: Arc<JsonRpcClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ChainReader for RpcChainReader {
    async fn current_height(&self) -> SourceResult<u64> {
        const METHOD: &str = "eth_blockNumber";
        let raw: String = self
            .client
            .call(METHOD, json!([]))
            .await?
            .ok_or_else(|| ConnectivityError::invalid(METHOD, "null block number"))?;
        parse_quantity(METHOD, &raw)
    }

    async fn block_at(&self, height: u64) -> SourceResult<Option<Block>> {
        const METHOD: &str = "eth_getBlockByNumber";
        let raw: Option<RpcBlock> = self
            .client
            .call(METHOD, json!([format!("0x{height:x}"), true]))
            .await?;
        match raw {
            Some(block) => {
                let block = convert_block(METHOD, block)?;
                ensure_height(METHOD, height, block).map(Some)
            }
            None => {
                debug!(height, "node returned no block");
                Ok(None)
            }
        }
    }
}

/// Enumerates job addresses from the on-chain Sequencer registry.
#[derive(Clone)]
pub struct SequencerWhitelist {
    client: Arc<JsonRpcClient>,
    sequencer: Address,
}

impl SequencerWhitelist {
    pub fn new(client: Arc<JsonRpcClient>, sequencer: Address) -> Self {
        Self { client, sequencer }
    }

    async fn eth_call(&self, data: Vec<u8>) -> SourceResult<Vec<u8>> {
        const METHOD: &str = "eth_call";
        let params = json!([
            {
                "to": self.sequencer.as_str(),
                "data": format!("0x{}", hex::encode(data)),
            },
            "latest"
        ]);
        let raw: String = self
            .client
            .call(METHOD, params)
            .await?
            .ok_or_else(|| ConnectivityError::invalid(METHOD, "null call result"))?;
        decode_data(METHOD, &raw)
    }

    async fn num_jobs(&self) -> SourceResult<u64> {
        let word = self.eth_call(NUM_JOBS_SELECTOR.as_bytes().to_vec()).await?;
        decode_job_count(&word)
    }

    async fn job_at(&self, index: u64) -> SourceResult<Address> {
        let word = self.eth_call(encode_uint_call(&JOB_AT_SELECTOR, index)).await?;
        decode_address(&word)
    }
}

#[async_trait]
impl WhitelistSource for SequencerWhitelist {
    async fn addresses(&self) -> SourceResult<Vec<Address>> {
        let total = self.num_jobs().await?;
        debug!(total, sequencer = %self.sequencer, "resolving sequencer jobs");
        try_join_all((0..total).map(|index| self.job_at(index))).await
    }
}

/// ABI-encodes `selector(uint256 value)`.
pub fn encode_uint_call(selector: &Selector, value: u64) -> Vec<u8> {
    let mut data = Vec::with_capacity(selector.as_bytes().len() + WORD);
    data.extend_from_slice(selector.as_bytes());
    data.extend_from_slice(&[0u8; WORD - 8]);
    data.extend_from_slice(&value.to_be_bytes());
    data
}

/// Decodes a uint256 return word that must fit in `u64`.
pub fn decode_count(word: &[u8]) -> SourceResult<u64> {
    let word = return_word(word)?;
    if word[..WORD - 8].iter().any(|b| *b != 0) {
        return Err(ConnectivityError::invalid(
            "numJobs",
            "job count exceeds u64 range",
        ));
    }
    let mut tail = [0u8; 8];
    tail.copy_from_slice(&word[WORD - 8..]);
    Ok(u64::from_be_bytes(tail))
}

/// Decodes the `numJobs()` word, rejecting counts above [`MAX_JOBS`].
pub fn decode_job_count(word: &[u8]) -> SourceResult<u64> {
    let total = decode_count(word)?;
    if total > MAX_JOBS {
        return Err(ConnectivityError::invalid(
            "numJobs",
            format!("registry reports {total} jobs, limit is {MAX_JOBS}"),
        ));
    }
    Ok(total)
}

/// Decodes an `address` return word (left-padded to 32 bytes).
pub fn decode_address(word: &[u8]) -> SourceResult<Address> {
    let word = return_word(word)?;
    if word[..WORD - 20].iter().any(|b| *b != 0) {
        return Err(ConnectivityError::invalid(
            "jobAt",
            "address word has non-zero padding",
        ));
    }
    let mut raw = [0u8; 20];
    raw.copy_from_slice(&word[WORD - 20..]);
    Ok(Address::from_bytes(&raw))
}

fn return_word(data: &[u8]) -> SourceResult<&[u8]> {
    data.get(..WORD).ok_or_else(|| {
        ConnectivityError::invalid(
            "eth_call",
            format!("expected a 32-byte word, got {} bytes", data.len()),
        )
    })
}
