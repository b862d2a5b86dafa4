pub mod candle_store;
pub mod client;
pub mod stream;

pub use candle_store::CandleStore;
pub use client::MarketClient;
pub use stream::StreamClient;
