/// Tunables for the wallet services.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// How many candidates the account number allocator tries before giving up.
    pub max_allocation_attempts: u32,
}

impl EngineConfig {
    pub const DEFAULT_MAX_ALLOCATION_ATTEMPTS: u32 = 10;

    /// Builds a config; an attempt budget of zero is raised to one.
    pub fn new(max_allocation_attempts: u32) -> Self {
        Self {
            max_allocation_attempts: max_allocation_attempts.max(1),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_ALLOCATION_ATTEMPTS)
    }
}
