//! Operator confirmation before destructive phases

use std::io::{BufRead, Write};
use tracing::debug;

pub const FFWD_UPGRADE_WARNING: &str = "Warning! The TripleO Fast Forward Upgrade workflow \
is a critical operation against the overcloud. Make sure the undercloud has been upgraded \
and that you have a backup of the overcloud before you continue.";

pub const CEPH_UPGRADE_WARNING: &str = "Warning! The ceph upgrade runs a rolling update of \
every ceph node in the overcloud. Make sure the cluster is healthy before you continue.";

/// Asks the operator whether to go ahead
pub trait Confirmer: Send + Sync {
    fn confirm(&self, prompt: &str) -> std::io::Result<bool>;
}

/// Prompts on stdout and reads a y/N answer from stdin
#[derive(Debug, Default, Clone)]
pub struct StdinConfirmer;

impl Confirmer for StdinConfirmer {
    fn confirm(&self, prompt: &str) -> std::io::Result<bool> {
        let mut stdout = std::io::stdout();
        writeln!(stdout, "{}", prompt)?;
        write!(stdout, "Are you sure you want to proceed? [y/N]: ")?;
        stdout.flush()?;

        let mut answer = String::new();
        std::io::stdin().lock().read_line(&mut answer)?;
        Ok(is_yes(&answer))
    }
}

/// Always gives the same answer. Used for `--yes` and in tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedConfirmer(pub bool);

impl Confirmer for FixedConfirmer {
    fn confirm(&self, _prompt: &str) -> std::io::Result<bool> {
        Ok(self.0)
    }
}

/// `--yes` skips the prompt entirely
pub fn operator_confirm(confirmer: &dyn Confirmer, yes: bool, prompt: &str) -> std::io::Result<bool> {
    if yes {
        debug!("--yes given, skipping confirmation");
        return Ok(true);
    }
    confirmer.confirm(prompt)
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_answers() {
        assert!(is_yes("y\n"));
        assert!(is_yes(" YES "));
        assert!(!is_yes("\n"));
        assert!(!is_yes("n"));
        assert!(!is_yes("yep"));
    }

    #[test]
    fn test_yes_flag_skips_prompt() {
        assert!(operator_confirm(&FixedConfirmer(false), true, "go?").unwrap());
        assert!(!operator_confirm(&FixedConfirmer(false), false, "go?").unwrap());
    }
}
