/// Usage/parse failure. The CLI maps this to exit code 2, distinct from
/// read I/O failures (exit 3) and gate failures (exit 1).
#[derive(Debug)]
pub struct ConfigError(pub String);

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for ConfigError {}

/// Classify a fatal error into a process exit code by walking the chain:
/// `ConfigError` is a usage/parse error (2), an `std::io::Error` anywhere in
/// the chain is an I/O failure (3), anything else defaults to 2.
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    if err.downcast_ref::<ConfigError>().is_some()
        || err.chain().any(|c| c.downcast_ref::<ConfigError>().is_some())
    {
        return 2;
    }
    if err.chain().any(|c| c.downcast_ref::<std::io::Error>().is_some()) {
        return 3;
    }
    2
}
