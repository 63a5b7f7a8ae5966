//! # Shell Completion
//!
//! Static completion scripts come from `clap_complete`. Track paths, titles and
//! artists for dynamic completion are listed by the hidden `complete-tracks`
//! command.
//!
//! ```bash
//! cadence completion bash > ~/.local/share/bash-completion/completions/cadence
//! cadence completion zsh > ~/.config/zsh/completions/_cadence
//! ```

use anyhow::Result;
use clap::Command;
use clap_complete::{generate, Generator, Shell as CompletionShell};
use std::collections::BTreeSet;
use std::io;
use std::path::Path;

use crate::cli::Shell;
use crate::db::Catalog;

/// Generate shell completions for the given shell
pub fn generate_completions<G: Generator>(gen: G, cmd: &mut Command) {
    generate(gen, cmd, cmd.get_name().to_string(), &mut io::stdout());
}

/// Convert our Shell enum to clap_complete's Shell enum
#[must_use]
pub fn shell_to_completion_shell(shell: Shell) -> CompletionShell {
    match shell {
        Shell::Bash => CompletionShell::Bash,
        Shell::Zsh => CompletionShell::Zsh,
        Shell::Fish => CompletionShell::Fish,
        Shell::PowerShell => CompletionShell::PowerShell,
        Shell::Elvish => CompletionShell::Elvish,
    }
}

/// Paths, titles and artists in the catalog, deduplicated and sorted.
pub fn track_completions(catalog: &Catalog) -> Result<Vec<String>> {
    let mut completions = BTreeSet::new();
    for track in catalog.all_records() {
        let track = track?;
        completions.insert(track.title);
        completions.insert(track.artist);
        completions.insert(track.path);
    }
    completions.retain(|value| !value.is_empty());
    Ok(completions.into_iter().collect())
}

/// Print completions one per line, quoting values that contain whitespace.
///
/// A missing catalog prints nothing; completion must never fail loudly.
pub fn print_track_completions(db_path: &Path) -> Result<()> {
    if !db_path.exists() {
        return Ok(());
    }
    let Ok(catalog) = Catalog::open(db_path) else {
        return Ok(());
    };

    for completion in track_completions(&catalog).unwrap_or_default() {
        if completion.contains(char::is_whitespace) {
            println!("\"{}\"", completion.replace('"', "\\\""));
        } else {
            println!("{completion}");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::Track;

    #[test]
    fn test_shell_conversion() {
        assert_eq!(shell_to_completion_shell(Shell::Bash), CompletionShell::Bash);
        assert_eq!(shell_to_completion_shell(Shell::PowerShell), CompletionShell::PowerShell);
    }

    #[test]
    fn test_track_completions_are_deduplicated() -> Result<()> {
        let catalog = Catalog::open_in_memory()?;
        catalog.upsert(Track::new("/m/a.mp3").with_tags("Song", "Band", "LP", "Rock"))?;
        catalog.upsert(Track::new("/m/b.mp3").with_tags("Other", "Band", "LP", "Rock"))?;

        let completions = track_completions(&catalog)?;
        assert_eq!(completions, ["/m/a.mp3", "/m/b.mp3", "Band", "Other", "Song"]);
        Ok(())
    }

    #[test]
    fn test_missing_catalog_prints_nothing() -> Result<()> {
        print_track_completions(Path::new("/nonexistent/cadence/library.db"))
    }
}
