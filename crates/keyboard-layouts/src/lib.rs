//! Keyboard layouts - what each physical key produces
//!
//! A layout maps physical key codes (`KeyA`, `Digit8`, `NumpadAdd`) to the
//! characters the key types with and without modifiers, plus the Windows
//! virtual key it reports. Keys that type nothing map to `None`.
//!
//! The tables are plain data. A [`KeyboardLayoutRegistry`] collects them so
//! keybinding resolution can look a layout up by name.

pub mod ru_win;

use serde::Serialize;
use tracing::debug;

/// Identifies a layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LayoutId {
    /// Windows layout identifier, e.g. `00000419`
    pub name: &'static str,
    pub id: &'static str,
    /// Human readable name
    pub text: &'static str,
}

/// Characters a single key produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct KeyProduction {
    pub value: &'static str,
    pub with_shift: &'static str,
    pub with_alt_gr: &'static str,
    pub with_shift_alt_gr: &'static str,
    /// Which of the four productions are dead keys
    pub with_dead_keys_mask: u8,
    pub vkey: &'static str,
}

impl KeyProduction {
    /// Whether the key types anything with AltGr held
    pub fn has_alt_gr(&self) -> bool {
        !self.with_alt_gr.is_empty() || !self.with_shift_alt_gr.is_empty()
    }
}

/// Physical key code to production, in table order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct KeyMapping(pub &'static [(&'static str, Option<KeyProduction>)]);

impl KeyMapping {
    /// Production of a key. `None` for unknown keys and keys that type nothing.
    pub fn get(&self, code: &str) -> Option<&KeyProduction> {
        self.0
            .iter()
            .find(|(key, _)| *key == code)
            .and_then(|(_, production)| production.as_ref())
    }

    /// Whether the table lists the key at all
    pub fn contains(&self, code: &str) -> bool {
        self.0.iter().any(|(key, _)| *key == code)
    }

    /// Keys that type something
    pub fn producing(&self) -> impl Iterator<Item = (&'static str, &KeyProduction)> {
        self.0
            .iter()
            .filter_map(|(key, production)| production.as_ref().map(|p| (*key, p)))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A complete layout description
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyboardLayoutInfo {
    pub layout: LayoutId,
    /// Other layouts active alongside this one
    pub secondary: Vec<LayoutId>,
    pub mapping: KeyMapping,
}

/// Collects layouts for lookup
#[derive(Debug, Default)]
pub struct KeyboardLayoutRegistry {
    layouts: Vec<KeyboardLayoutInfo>,
}

impl KeyboardLayoutRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a layout. A later layout with the same name replaces the earlier one.
    pub fn register(&mut self, info: KeyboardLayoutInfo) {
        debug!("Registering keyboard layout {} ({})", info.layout.name, info.layout.text);
        self.layouts.retain(|existing| existing.layout.name != info.layout.name);
        self.layouts.push(info);
    }

    pub fn layouts(&self) -> &[KeyboardLayoutInfo] {
        &self.layouts
    }

    pub fn find(&self, name: &str) -> Option<&KeyboardLayoutInfo> {
        self.layouts.iter().find(|info| info.layout.name == name)
    }
}

/// Register every bundled layout
pub fn register_all(registry: &mut KeyboardLayoutRegistry) {
    registry.register(ru_win::layout());
}
