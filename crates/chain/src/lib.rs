pub mod block_source;
pub mod dex;

pub use block_source::{
    BlockSource, BlockSourceFactory, RpcBlockSource, RpcBlockSourceFactory, SimulatedBlockSource,
    SimulatedBlockSourceFactory,
};
pub use dex::{
    DexProvider, DexProviderFactory, PancakeSwapProvider, SushiSwapProvider, UniswapV2Provider,
};
