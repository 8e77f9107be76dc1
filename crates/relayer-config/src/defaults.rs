pub const fn relayer_port() -> u16 {
    9955
}
pub const fn consensus_threshold() -> u64 {
    70
}
pub const fn enabled() -> bool {
    true
}
pub const fn maturity_degree() -> u64 {
    10
}
pub const fn polling_interval() -> u64 {
    5_000
}
pub const fn fetch_batch_size() -> usize {
    10
}
pub const fn max_blocks_per_step() -> u64 {
    10
}
pub const fn max_height_fetch_failures() -> u32 {
    60
}
pub const fn print_progress_interval() -> u64 {
    7_000
}
pub const fn wait_mined_timeout() -> u64 {
    300_000
}
pub const fn wait_mined_poll_interval() -> u64 {
    5_000
}
pub const fn status_check_interval() -> u64 {
    10_000
}
pub const fn deployment_wait_timeout() -> u64 {
    60_000
}
pub const fn tendermint_fee() -> u64 {
    100_000
}
