//! Keyboard shortcuts over the selection.
//!
//! A chord maps to an [`Action`]; an action runs once per selected block
//! (or once, for selection movement). Each member of a batch is checked on
//! its own, so one block that forbids the action does not stop the rest.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

use crate::{BlockId, CommandError, Engine, Outcome};

/// Modifier keys a chord requires.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Modifiers {
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
    pub meta: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers {
        ctrl: false,
        alt: false,
        shift: false,
        meta: false,
    };

    pub const CTRL: Modifiers = Modifiers {
        ctrl: true,
        alt: false,
        shift: false,
        meta: false,
    };

    pub const ALT: Modifiers = Modifiers {
        ctrl: false,
        alt: true,
        shift: false,
        meta: false,
    };
}

/// A key plus modifiers, written `"ctrl+shift+d"`.
///
/// Key names are lowercased; modifier order in the string does not matter.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyChord {
    pub modifiers: Modifiers,
    pub key: String,
}

impl KeyChord {
    pub fn new(modifiers: Modifiers, key: impl Into<String>) -> Self {
        Self {
            modifiers,
            key: key.into().to_lowercase(),
        }
    }
}

impl FromStr for KeyChord {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut modifiers = Modifiers::NONE;
        let mut key = None;
        for part in s.split('+').map(str::trim) {
            match part.to_lowercase().as_str() {
                "" => return Err(format!("empty key in chord {s:?}")),
                "ctrl" | "control" => modifiers.ctrl = true,
                "alt" | "option" => modifiers.alt = true,
                "shift" => modifiers.shift = true,
                "meta" | "cmd" | "super" => modifiers.meta = true,
                other => {
                    if key.replace(other.to_string()).is_some() {
                        return Err(format!("more than one key in chord {s:?}"));
                    }
                }
            }
        }
        let key = key.ok_or_else(|| format!("no key in chord {s:?}"))?;
        Ok(Self { modifiers, key })
    }
}

impl fmt::Display for KeyChord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = self.modifiers;
        for (held, name) in [(m.ctrl, "ctrl"), (m.alt, "alt"), (m.shift, "shift"), (m.meta, "meta")] {
            if held {
                write!(f, "{name}+")?;
            }
        }
        f.write_str(&self.key)
    }
}

/// What a shortcut does.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Duplicate,
    Remove,
    MoveUp,
    MoveDown,
    ToggleStatus,
    SelectNext,
    SelectPrevious,
    ClearSelection,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        self.into()
    }

    /// Runs once per selected block rather than once overall.
    pub fn is_batch(&self) -> bool {
        !matches!(
            self,
            Action::SelectNext | Action::SelectPrevious | Action::ClearSelection
        )
    }
}

/// Per-member results of one shortcut.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BatchReport {
    pub applied: Vec<BlockId>,
    /// Members that were left alone, with the reason if one was given.
    pub skipped: Vec<(BlockId, Option<CommandError>)>,
}

impl BatchReport {
    pub fn is_empty(&self) -> bool {
        self.applied.is_empty() && self.skipped.is_empty()
    }
}

/// The stock chord table.
pub fn default_bindings() -> Vec<(KeyChord, Action)> {
    vec![
        (KeyChord::new(Modifiers::CTRL, "d"), Action::Duplicate),
        (KeyChord::new(Modifiers::NONE, "delete"), Action::Remove),
        (KeyChord::new(Modifiers::ALT, "up"), Action::MoveUp),
        (KeyChord::new(Modifiers::ALT, "down"), Action::MoveDown),
        (KeyChord::new(Modifiers::CTRL, "enter"), Action::ToggleStatus),
        (KeyChord::new(Modifiers::NONE, "up"), Action::SelectPrevious),
        (KeyChord::new(Modifiers::NONE, "down"), Action::SelectNext),
        (KeyChord::new(Modifiers::NONE, "escape"), Action::ClearSelection),
    ]
}

/// Chord table plus batch execution.
#[derive(Clone, Debug, Default)]
pub struct ShortcutController {
    bindings: BTreeMap<KeyChord, Action>,
}

impl ShortcutController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults() -> Self {
        let mut controller = Self::new();
        for (chord, action) in default_bindings() {
            controller.bind(chord, action);
        }
        controller
    }

    /// Defaults overridden by configured `"chord" -> action` pairs.
    pub fn from_config(overrides: &BTreeMap<String, Action>) -> Result<Self, String> {
        let mut controller = Self::with_defaults();
        for (chord, action) in overrides {
            controller.bind(chord.parse()?, *action);
        }
        Ok(controller)
    }

    /// Bind a chord, returning the action it replaced.
    pub fn bind(&mut self, chord: KeyChord, action: Action) -> Option<Action> {
        self.bindings.insert(chord, action)
    }

    pub fn unbind(&mut self, chord: &KeyChord) -> Option<Action> {
        self.bindings.remove(chord)
    }

    pub fn action_for(&self, chord: &KeyChord) -> Option<Action> {
        self.bindings.get(chord).copied()
    }

    pub fn bindings(&self) -> impl Iterator<Item = (&KeyChord, &Action)> {
        self.bindings.iter()
    }

    /// Run whatever `chord` is bound to. `None` if it is unbound.
    pub fn handle(&self, engine: &mut Engine, chord: &KeyChord) -> Option<BatchReport> {
        let action = self.action_for(chord)?;
        Some(self.run(engine, action))
    }

    /// Run an action over the current selection.
    ///
    /// Members are visited in document order (reverse for `MoveDown`, so
    /// adjacent selected blocks do not leapfrog each other).
    pub fn run(&self, engine: &mut Engine, action: Action) -> BatchReport {
        let mut report = BatchReport::default();

        if !action.is_batch() {
            let outcome = match action {
                Action::SelectNext => engine.select_next(),
                Action::SelectPrevious => engine.select_previous(),
                _ => engine.clear_selection(),
            };
            // Selection movement reports what ended up selected.
            if outcome.is_applied() {
                report.applied = engine.selection().iter().cloned().collect();
            }
            return report;
        }

        let mut members: Vec<BlockId> = engine
            .document_order()
            .into_iter()
            .filter(|id| engine.is_selected(id))
            .collect();
        if action == Action::MoveDown {
            members.reverse();
        }

        for id in members {
            let outcome = match action {
                Action::Duplicate => engine.duplicate(&id),
                Action::Remove => engine.remove(std::slice::from_ref(&id)),
                Action::MoveUp => engine.move_up(&id),
                Action::MoveDown => engine.move_down(&id),
                Action::ToggleStatus => engine.toggle_status(&id),
                Action::SelectNext | Action::SelectPrevious | Action::ClearSelection => {
                    Outcome::Unchanged
                }
            };
            record(&mut report, id, outcome);
        }

        tracing::debug!(
            action = action.as_str(),
            applied = report.applied.len(),
            skipped = report.skipped.len(),
            "shortcut batch"
        );
        report
    }
}

fn record(report: &mut BatchReport, id: BlockId, outcome: Outcome) {
    match outcome {
        Outcome::Applied => report.applied.push(id),
        Outcome::Unchanged => report.skipped.push((id, None)),
        Outcome::Rejected(error) => report.skipped.push((id, Some(error))),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{Block, BlockRegistry, Status};

    fn engine(blocks: &[Block]) -> Engine {
        Engine::hydrate(Arc::new(BlockRegistry::builtin()), blocks).unwrap()
    }

    fn id(s: &str) -> BlockId {
        BlockId::new(s)
    }

    #[test]
    fn test_chord_parse_and_display() {
        let chord: KeyChord = "Shift+Ctrl+D".parse().unwrap();
        assert!(chord.modifiers.ctrl);
        assert!(chord.modifiers.shift);
        assert!(!chord.modifiers.alt);
        assert_eq!(chord.key, "d");
        assert_eq!(chord.to_string(), "ctrl+shift+d");

        assert!("ctrl+".parse::<KeyChord>().is_err());
        assert!("ctrl+shift".parse::<KeyChord>().is_err());
        assert!("a+b".parse::<KeyChord>().is_err());
    }

    #[test]
    fn test_action_names() {
        assert_eq!(Action::MoveDown.as_str(), "move_down");
        assert_eq!("toggle_status".parse::<Action>().unwrap(), Action::ToggleStatus);
    }

    #[test]
    fn test_default_bindings() {
        let controller = ShortcutController::with_defaults();
        assert_eq!(
            controller.action_for(&"ctrl+d".parse().unwrap()),
            Some(Action::Duplicate)
        );
        assert_eq!(
            controller.action_for(&"alt+down".parse().unwrap()),
            Some(Action::MoveDown)
        );
        assert_eq!(controller.action_for(&"ctrl+z".parse().unwrap()), None);
    }

    #[test]
    fn test_config_overrides() {
        let mut overrides = BTreeMap::new();
        overrides.insert("ctrl+shift+d".to_string(), Action::Duplicate);
        overrides.insert("ctrl+d".to_string(), Action::Remove);
        let controller = ShortcutController::from_config(&overrides).unwrap();
        assert_eq!(
            controller.action_for(&"ctrl+d".parse().unwrap()),
            Some(Action::Remove)
        );

        overrides.insert("ctrl+".to_string(), Action::Remove);
        assert!(ShortcutController::from_config(&overrides).is_err());
    }

    #[test]
    fn test_batch_duplicate_skips_denied_member() {
        // Only x is duplicable: module is single-instance.
        let mut e = engine(&[Block::new("x", "text"), Block::new("y", "module")]);
        e.toggle_select(&id("x"));
        e.toggle_select(&id("y"));

        let report = ShortcutController::with_defaults()
            .handle(&mut e, &"ctrl+d".parse().unwrap())
            .unwrap();
        assert_eq!(report.applied, vec![id("x")]);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].0, id("y"));
        assert!(report.skipped[0].1.is_some());

        let roots = e.units().roots();
        assert_eq!(roots.len(), 3);
        assert_eq!(roots[0], id("x"));
        assert_eq!(roots[2], id("y"));
    }

    #[test]
    fn test_batch_move_down_keeps_relative_order() {
        let mut e = engine(&[
            Block::new("a", "text"),
            Block::new("b", "text"),
            Block::new("c", "text"),
        ]);
        e.toggle_select(&id("a"));
        e.toggle_select(&id("b"));

        let report = ShortcutController::new().run(&mut e, Action::MoveDown);
        assert_eq!(report.applied, vec![id("b"), id("a")]);
        let roots: Vec<&str> = e.units().roots().iter().map(BlockId::as_str).collect();
        assert_eq!(roots, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_toggle_status_and_navigation() {
        let mut e = engine(&[Block::new("a", "text"), Block::new("b", "text")]);
        let controller = ShortcutController::with_defaults();

        controller.handle(&mut e, &"down".parse().unwrap());
        assert!(e.is_selected(&id("a")));
        controller.handle(&mut e, &"ctrl+enter".parse().unwrap());
        assert_eq!(e.find_by_id(&id("a")).unwrap().status, Status::Close);

        let report = controller.handle(&mut e, &"down".parse().unwrap()).unwrap();
        assert_eq!(report.applied, vec![id("b")]);
        controller.handle(&mut e, &"escape".parse().unwrap());
        assert!(e.selection().is_empty());
        assert!(controller.handle(&mut e, &"f5".parse().unwrap()).is_none());
    }
}
