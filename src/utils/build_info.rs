/// Compile-time build metadata produced by `build.rs`.
#[derive(Debug, Clone, Copy)]
pub struct BuildMetadata {
    pub version: &'static str,
    /// Short git hash, suffixed `-dirty` for uncommitted changes.
    pub revision: &'static str,
    pub timestamp: &'static str,
    pub target: &'static str,
    pub profile: &'static str,
    pub rustc: &'static str,
}

impl BuildMetadata {
    /// One-line banner used by the shell's `version` command.
    pub fn banner(&self) -> String {
        format!(
            "household_finance {} ({}, {} {}, built {} with {})",
            self.version, self.revision, self.target, self.profile, self.timestamp, self.rustc
        )
    }
}

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn current() -> BuildMetadata {
    BuildMetadata {
        version: VERSION,
        revision: option_env!("HOUSEHOLD_FINANCE_BUILD_REVISION").unwrap_or("unknown"),
        timestamp: option_env!("HOUSEHOLD_FINANCE_BUILD_TIMESTAMP").unwrap_or("unknown"),
        target: option_env!("HOUSEHOLD_FINANCE_BUILD_TARGET").unwrap_or("unknown"),
        profile: option_env!("HOUSEHOLD_FINANCE_BUILD_PROFILE").unwrap_or("unknown"),
        rustc: option_env!("HOUSEHOLD_FINANCE_BUILD_RUSTC").unwrap_or("unknown"),
    }
}
