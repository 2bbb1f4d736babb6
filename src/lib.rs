pub mod block;
pub mod cli;
pub mod codec;
pub mod facade;
pub mod keystore;
pub mod network;
pub mod pool;
pub mod primitives;
pub mod reorg;
pub mod runtime;
pub mod storage;
pub mod telemetry;
pub mod tree;
