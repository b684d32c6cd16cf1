//! Row and column control directives.
//!
//! Sheets steer processing with sentinel phrases ("only this row",
//! "stop after this column", ...). They are parsed once, up front, into
//! typed [`ControlDirective`]s so nothing downstream matches raw strings.

use std::collections::BTreeSet;

use serde::Serialize;

use sheetstream_config::StructureConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DirectiveScope {
    Row,
    Column,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DirectiveKind {
    Only,
    From,
    Until,
}

/// A typed directive. `index` is a one-based row number for row scope and a
/// zero-based column index for column scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ControlDirective {
    pub scope: DirectiveScope,
    pub kind: DirectiveKind,
    pub index: u32,
}

/// Which indices of one scope are eligible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    All,
    /// Union of all `Only` directives; `From`/`Until` are ignored.
    Only(BTreeSet<u32>),
    /// Inclusive bracket from the first `From` and the first `Until`.
    Range { from: Option<u32>, until: Option<u32> },
}

impl Selection {
    pub fn allows(&self, index: u32) -> bool {
        self.allows_span(index, index)
    }

    /// Whether a span `[start, end]` (a column group) is eligible.
    ///
    /// `Only` needs a marked index inside the span. `From` keeps spans that
    /// reach it; `Until` drops spans starting to its right, which skips every
    /// column right of a "stop after" group.
    pub fn allows_span(&self, start: u32, end: u32) -> bool {
        match self {
            Selection::All => true,
            Selection::Only(set) => set.range(start..=end).next().is_some(),
            Selection::Range { from, until } => {
                from.map_or(true, |f| end >= f) && until.map_or(true, |u| start <= u)
            }
        }
    }
}

/// All directives found in a sheet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ControlSet {
    directives: Vec<ControlDirective>,
}

impl ControlSet {
    pub fn new(directives: Vec<ControlDirective>) -> Self {
        Self { directives }
    }

    pub fn push(&mut self, directive: ControlDirective) {
        self.directives.push(directive);
    }

    pub fn is_empty(&self) -> bool {
        self.directives.is_empty()
    }

    pub fn directives(&self) -> &[ControlDirective] {
        &self.directives
    }

    pub fn for_scope(&self, scope: DirectiveScope) -> impl Iterator<Item = &ControlDirective> {
        self.directives.iter().filter(move |d| d.scope == scope)
    }

    /// Resolve the directives of one scope into a [`Selection`].
    pub fn selection(&self, scope: DirectiveScope) -> Selection {
        let only: BTreeSet<u32> = self
            .for_scope(scope)
            .filter(|d| d.kind == DirectiveKind::Only)
            .map(|d| d.index)
            .collect();
        if !only.is_empty() {
            return Selection::Only(only);
        }

        let from = self
            .for_scope(scope)
            .filter(|d| d.kind == DirectiveKind::From)
            .map(|d| d.index)
            .min();
        let until = self
            .for_scope(scope)
            .filter(|d| d.kind == DirectiveKind::Until)
            .map(|d| d.index)
            .min();
        if from.is_none() && until.is_none() {
            Selection::All
        } else {
            Selection::Range { from, until }
        }
    }
}

/// Matches cell text against the configured phrases.
#[derive(Debug, Clone)]
pub struct DirectiveParser {
    row: [(DirectiveKind, String); 3],
    column: [(DirectiveKind, String); 3],
}

impl DirectiveParser {
    pub fn new(config: &StructureConfig) -> Self {
        let lower = |s: &str| s.trim().to_lowercase();
        Self {
            row: [
                (DirectiveKind::Only, lower(&config.row_only_phrase)),
                (DirectiveKind::From, lower(&config.row_from_phrase)),
                (DirectiveKind::Until, lower(&config.row_until_phrase)),
            ],
            column: [
                (DirectiveKind::Only, lower(&config.column_only_phrase)),
                (DirectiveKind::From, lower(&config.column_from_phrase)),
                (DirectiveKind::Until, lower(&config.column_until_phrase)),
            ],
        }
    }

    /// Parse one cell. Case-insensitive substring match.
    pub fn parse(&self, scope: DirectiveScope, text: &str, index: u32) -> Option<ControlDirective> {
        if text.trim().is_empty() {
            return None;
        }
        let text = text.to_lowercase();
        let phrases = match scope {
            DirectiveScope::Row => &self.row,
            DirectiveScope::Column => &self.column,
        };
        phrases
            .iter()
            .find(|(_, phrase)| !phrase.is_empty() && text.contains(phrase.as_str()))
            .map(|(kind, _)| ControlDirective {
                scope,
                kind: *kind,
                index,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(kind: DirectiveKind, index: u32) -> ControlDirective {
        ControlDirective {
            scope: DirectiveScope::Row,
            kind,
            index,
        }
    }

    #[test]
    fn test_parse_phrases() {
        let parser = DirectiveParser::new(&StructureConfig::default());
        assert_eq!(
            parser.parse(DirectiveScope::Row, "Only this row", 5),
            Some(row(DirectiveKind::Only, 5))
        );
        assert_eq!(
            parser.parse(DirectiveScope::Row, ">> from this row", 3).map(|d| d.kind),
            Some(DirectiveKind::From)
        );
        assert_eq!(
            parser.parse(DirectiveScope::Column, "stop after this column", 4).map(|d| d.kind),
            Some(DirectiveKind::Until)
        );
        assert_eq!(parser.parse(DirectiveScope::Row, "stop after this column", 4), None);
        assert_eq!(parser.parse(DirectiveScope::Row, "", 4), None);
    }

    #[test]
    fn test_only_wins_over_range() {
        let controls = ControlSet::new(vec![row(DirectiveKind::Only, 5), row(DirectiveKind::From, 3)]);
        let selection = controls.selection(DirectiveScope::Row);
        assert!(selection.allows(5));
        assert!(!selection.allows(3));
        assert!(!selection.allows(4));
        assert!(!selection.allows(6));
    }

    #[test]
    fn test_only_directives_are_unioned() {
        let controls = ControlSet::new(vec![row(DirectiveKind::Only, 5), row(DirectiveKind::Only, 9)]);
        let selection = controls.selection(DirectiveScope::Row);
        assert!(selection.allows(5));
        assert!(selection.allows(9));
        assert!(!selection.allows(7));
    }

    #[test]
    fn test_from_until_bracket() {
        let controls = ControlSet::new(vec![row(DirectiveKind::From, 10), row(DirectiveKind::Until, 12)]);
        let selection = controls.selection(DirectiveScope::Row);
        assert_eq!(selection, Selection::Range { from: Some(10), until: Some(12) });
        assert!(!selection.allows(9));
        assert!(selection.allows(10));
        assert!(selection.allows(12));
        assert!(!selection.allows(13));
    }

    #[test]
    fn test_scopes_are_independent() {
        let controls = ControlSet::new(vec![row(DirectiveKind::Only, 5)]);
        assert_eq!(controls.selection(DirectiveScope::Column), Selection::All);
    }

    #[test]
    fn test_span_selection() {
        let only = Selection::Only([6].into_iter().collect());
        assert!(only.allows_span(3, 7));
        assert!(!only.allows_span(8, 9));

        let until = Selection::Range { from: None, until: Some(7) };
        assert!(until.allows_span(3, 7));
        assert!(until.allows_span(7, 9));
        assert!(!until.allows_span(8, 9));

        let from = Selection::Range { from: Some(8), until: None };
        assert!(!from.allows_span(3, 7));
        assert!(from.allows_span(7, 9));
    }
}
