use crate::key::CoinId;

/// Top-level error type for swap engine operations.
///
/// Every variant is a precondition failure: the operation returns the error
/// and leaves state untouched. Invariant violations discovered while a
/// mutation is being applied (a failed k-check, a negative reserve, a
/// double-spent order) are consensus-fatal and abort via `panic!` instead;
/// they must never be swallowed by a caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SwapError {
    /// No pool exists for the requested coin pair.
    #[error("pair ({0}, {1}) does not exist")]
    PairNotExists(CoinId, CoinId),

    /// Both sides of the pair are the same coin.
    #[error("identical coins: {0}")]
    IdenticalCoins(CoinId),

    /// The pool cannot cover the requested output.
    #[error("insufficient liquidity")]
    InsufficientLiquidity,

    /// Initial or additional liquidity is below the minimum bound.
    #[error("insufficient liquidity minted")]
    InsufficientLiquidityMinted,

    /// Burn output is below the caller's minimum.
    #[error("insufficient liquidity burned")]
    InsufficientLiquidityBurned,

    /// The caller holds fewer liquidity shares than it tries to burn.
    #[error("insufficient liquidity balance")]
    InsufficientLiquidityBalance,

    /// The computed input exceeds the caller's maximum.
    #[error("insufficient input amount")]
    InsufficientInputAmount,

    /// The computed output is below the caller's minimum.
    #[error("insufficient output amount")]
    InsufficientOutputAmount,

    /// The constant-product check failed for a proposed swap.
    #[error("constant product invariant violated")]
    KViolation,

    /// No live order with the given id.
    #[error("limit order {0} not found")]
    OrderNotFound(u32),

    /// The caller does not own the order it tries to cancel.
    #[error("sender is not the owner of order {0}")]
    NotOrderOwner(u32),
}

/// Result type alias for swap engine operations.
pub type Result<T> = std::result::Result<T, SwapError>;
