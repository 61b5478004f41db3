use env_logger::Env;

/// Environment variable holding the filter directive, e.g. `QF_LOG=packed_qf=debug`.
pub const LOG_ENV: &str = "QF_LOG";

pub fn init_logger() {
    env_logger::Builder::from_env(Env::default().filter_or(LOG_ENV, "warn")).init();
}

pub fn init_test_logger() {
    let _ = env_logger::Builder::from_env(Env::default().filter_or(LOG_ENV, "debug"))
        .is_test(true)
        .try_init();
}
