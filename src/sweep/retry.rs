/// How often a failed device operation is attempted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { retries: 1 }
    }
}

impl RetryPolicy {
    /// Allow `retries` extra attempts after the first one
    pub fn new(retries: u32) -> Self {
        Self { retries }
    }

    /// Extra attempts after the first one
    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// Total attempts, at least one
    pub fn attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }
}
