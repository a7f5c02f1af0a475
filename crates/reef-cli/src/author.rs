//! Author identity resolution for commands that stamp a name on records.
//!
//! The chain: `--author` flag > `REEF_AUTHOR` env > `USER` env (TTY only).
//! `rf comment` requires an author; `rf create` and `rf delete` stamp one
//! opportunistically and leave the field empty when none resolves.

use std::env;

/// Environment reader, swapped for a mock in tests.
trait EnvReader {
    fn get(&self, key: &str) -> Option<String>;
    fn is_tty(&self) -> bool;
}

struct RealEnv;

impl EnvReader for RealEnv {
    fn get(&self, key: &str) -> Option<String> {
        env::var(key).ok().filter(|v| !v.is_empty())
    }

    fn is_tty(&self) -> bool {
        use std::io::IsTerminal;
        std::io::stdin().is_terminal()
    }
}

fn resolve_author_with(cli_flag: Option<&str>, env: &dyn EnvReader) -> Option<String> {
    if let Some(author) = cli_flag {
        if !author.is_empty() {
            return Some(author.to_string());
        }
    }

    if let Some(val) = env.get("REEF_AUTHOR") {
        return Some(val);
    }

    // USER is only trusted interactively; pipelines must be explicit.
    if env.is_tty() {
        if let Some(val) = env.get("USER") {
            return Some(val);
        }
    }

    None
}

/// Resolve the author identity, or `None` when nothing in the chain is set.
#[must_use]
pub fn resolve_author(cli_flag: Option<&str>) -> Option<String> {
    resolve_author_with(cli_flag, &RealEnv)
}
