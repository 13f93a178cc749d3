//! Commands excluded from import.

use std::collections::HashSet;

/// Set of literal commands to skip during import.
///
/// Matching is exact and case-sensitive against the whole command, so an
/// entry `ls` does not exclude `ls -la`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IgnoreList {
    commands: HashSet<String>,
}

impl IgnoreList {
    /// Builds the list from a comma-separated string.
    ///
    /// Empty items are dropped. Items are not trimmed.
    pub fn parse(list: &str) -> Self {
        list.split(',')
            .filter(|command| !command.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn contains(&self, command: &str) -> bool {
        self.commands.contains(command)
    }

}

impl FromIterator<String> for IgnoreList {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self {
            commands: iter.into_iter().collect(),
        }
    }
}
