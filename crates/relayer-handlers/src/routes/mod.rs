/// Lock and burn on the embedded executor.
pub mod bridge;
/// Relayer information.
pub mod info;
/// Key import, lock and unlock.
pub mod keys;
/// Prometheus metrics.
pub mod metric;
/// Oracle queries.
pub mod oracle;
/// Submitted transactions.
pub mod submissions;
