//! Consent gate for creating new cache directories.

use std::fmt;

/// Why directory creation was refused, with the flags the caller still owes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockReason {
    pub missing_confirm_create: bool,
    pub missing_understood_growth: bool,
}

impl fmt::Display for BlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Permission required before creating a cache directory.")?;
        writeln!(
            f,
            "The cache stores conversation notes on disk and grows with every update."
        )?;
        writeln!(f, "To proceed, call cache_init again with:")?;
        if self.missing_confirm_create {
            writeln!(f, "- confirmCreate: true (you agree to create the directory)")?;
        }
        if self.missing_understood_growth {
            writeln!(
                f,
                "- understoodGrowth: true (you understand the files grow over time)"
            )?;
        }
        Ok(())
    }
}

/// `None` when both consent flags are set, otherwise the reason creation is
/// blocked.  Callers only consult this for directories that do not exist yet.
pub fn check_create(confirm_create: bool, understood_growth: bool) -> Option<BlockReason> {
    if confirm_create && understood_growth {
        return None;
    }
    Some(BlockReason {
        missing_confirm_create: !confirm_create,
        missing_understood_growth: !understood_growth,
    })
}
