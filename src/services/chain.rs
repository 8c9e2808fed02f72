//! On-chain access: pool reserves, token approval and router swaps
//!
//! `ChainClient` is the seam between the bot and the chain. The alloy-backed
//! implementation talks JSON-RPC through an HTTP provider with a local signer.

use alloy::network::{EthereumWallet, ReceiptResponse};
use alloy::primitives::{Address, TxHash, U256};
use alloy::providers::{DynProvider, PendingTransactionBuilder, Provider, ProviderBuilder};
use alloy::signers::local::PrivateKeySigner;
use alloy::sol;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tracing::{debug, info};

sol! {
    #[sol(rpc)]
    interface IUniswapV2Pair {
        function getReserves() external view returns (uint112 reserve0, uint112 reserve1, uint32 blockTimestampLast);
    }

    #[sol(rpc)]
    interface IUniswapV2Router02 {
        function swapExactTokensForTokens(
            uint256 amountIn,
            uint256 amountOutMin,
            address[] calldata path,
            address to,
            uint256 deadline
        ) external returns (uint256[] memory amounts);
    }

    #[sol(rpc)]
    interface IERC20 {
        function approve(address spender, uint256 amount) external returns (bool);
    }
}

/// Raw pool reserves; the pair's token0 is the base, token1 the quote
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reserves {
    pub base: U256,
    pub quote: U256,
}

/// Arguments of a `swapExactTokensForTokens` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapOrder {
    pub amount_in: U256,
    /// Always zero: swaps are submitted without slippage protection
    pub amount_out_min: U256,
    pub path: Vec<Address>,
    pub to: Address,
    /// Unix timestamp in seconds
    pub deadline: u64,
}

#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Current reserves of the pair contract
    async fn get_reserves(&self, pair: Address) -> Result<Reserves>;

    /// Submit `approve(spender, amount)` on `token`; returns once the tx is broadcast
    async fn approve(&self, token: Address, spender: Address, amount: U256) -> Result<TxHash>;

    /// Submit a router swap; returns once the tx is broadcast
    async fn swap_exact_tokens_for_tokens(&self, router: Address, order: &SwapOrder)
        -> Result<TxHash>;

    /// Block until the transaction is mined; errors if it reverted
    async fn wait_for_confirmation(&self, tx_hash: TxHash) -> Result<()>;

    /// Address transactions are signed with, if a key is configured
    fn signer_address(&self) -> Option<Address>;
}

/// `ChainClient` over an alloy HTTP provider
pub struct AlloyChainClient {
    provider: DynProvider,
    signer_address: Option<Address>,
}

impl AlloyChainClient {
    /// Connect to `rpc_url`; without a private key only reads are possible
    pub async fn connect(rpc_url: &str, private_key: Option<&str>) -> Result<Self> {
        match private_key {
            Some(key) => {
                let signer: PrivateKeySigner = key
                    .trim()
                    .parse()
                    .context("Failed to parse private key")?;
                let signer_address = signer.address();

                let provider = ProviderBuilder::new()
                    .wallet(EthereumWallet::from(signer))
                    .connect(rpc_url)
                    .await
                    .with_context(|| format!("Failed to connect to RPC at {rpc_url}"))?
                    .erased();

                info!(signer = %signer_address, "Chain client connected with signer");

                Ok(Self {
                    provider,
                    signer_address: Some(signer_address),
                })
            }
            None => {
                let provider = ProviderBuilder::new()
                    .connect(rpc_url)
                    .await
                    .with_context(|| format!("Failed to connect to RPC at {rpc_url}"))?
                    .erased();

                info!("Chain client connected read-only");

                Ok(Self {
                    provider,
                    signer_address: None,
                })
            }
        }
    }

    fn ensure_signer(&self) -> Result<()> {
        if self.signer_address.is_none() {
            bail!("No signing key configured; cannot send transactions");
        }
        Ok(())
    }
}

#[async_trait]
impl ChainClient for AlloyChainClient {
    async fn get_reserves(&self, pair: Address) -> Result<Reserves> {
        let pair_contract = IUniswapV2Pair::new(pair, self.provider.clone());
        let reserves = pair_contract
            .getReserves()
            .call()
            .await
            .context("getReserves call failed")?;

        Ok(Reserves {
            base: U256::from(reserves.reserve0),
            quote: U256::from(reserves.reserve1),
        })
    }

    async fn approve(&self, token: Address, spender: Address, amount: U256) -> Result<TxHash> {
        self.ensure_signer()?;

        let erc20 = IERC20::new(token, self.provider.clone());
        let pending = erc20
            .approve(spender, amount)
            .send()
            .await
            .context("Failed to submit approve transaction")?;

        let tx_hash = *pending.tx_hash();
        debug!(%token, %spender, %amount, %tx_hash, "Approve submitted");
        Ok(tx_hash)
    }

    async fn swap_exact_tokens_for_tokens(
        &self,
        router: Address,
        order: &SwapOrder,
    ) -> Result<TxHash> {
        self.ensure_signer()?;

        let router_contract = IUniswapV2Router02::new(router, self.provider.clone());
        let pending = router_contract
            .swapExactTokensForTokens(
                order.amount_in,
                order.amount_out_min,
                order.path.clone(),
                order.to,
                U256::from(order.deadline),
            )
            .send()
            .await
            .context("Failed to submit swap transaction")?;

        let tx_hash = *pending.tx_hash();
        debug!(%router, amount_in = %order.amount_in, %tx_hash, "Swap submitted");
        Ok(tx_hash)
    }

    async fn wait_for_confirmation(&self, tx_hash: TxHash) -> Result<()> {
        let receipt = PendingTransactionBuilder::new(self.provider.root().clone(), tx_hash)
            .get_receipt()
            .await
            .with_context(|| format!("Failed waiting for receipt of {tx_hash}"))?;

        if !receipt.status() {
            bail!("Transaction {tx_hash} reverted");
        }

        debug!(%tx_hash, block = ?receipt.block_number(), "Transaction confirmed");
        Ok(())
    }

    fn signer_address(&self) -> Option<Address> {
        self.signer_address
    }
}
