//! Assignment engine — pure field-to-page mapping logic.
//!
//! An [`AssignmentSet`] maps every registry field onto one of the three
//! onboarding pages. The engine validates sets against the registry,
//! computes per-page field lists for the form runtime, and provides the
//! pure transforms the admin editor applies while a set is being edited.
//! No I/O happens here; violations come back as values, never panics.

use serde::{Deserialize, Serialize};

use crate::registry::{FieldKey, FieldSpec, spec_for};

/// One of the three onboarding pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Page {
    One,
    Two,
    Three,
}

impl Page {
    /// All pages in step order.
    pub const ALL: [Page; 3] = [Page::One, Page::Two, Page::Three];

    /// The 1-based page number, as persisted and shown to users.
    pub fn number(&self) -> u8 {
        match self {
            Self::One => 1,
            Self::Two => 2,
            Self::Three => 3,
        }
    }

    pub fn from_number(n: i64) -> Option<Page> {
        match n {
            1 => Some(Self::One),
            2 => Some(Self::Two),
            3 => Some(Self::Three),
            _ => None,
        }
    }

    /// The next page, if this is not the last one.
    pub fn next(&self) -> Option<Page> {
        match self {
            Self::One => Some(Self::Two),
            Self::Two => Some(Self::Three),
            Self::Three => None,
        }
    }

    /// The previous page, if this is not the first one.
    pub fn prev(&self) -> Option<Page> {
        match self {
            Self::One => None,
            Self::Two => Some(Self::One),
            Self::Three => Some(Self::Two),
        }
    }
}

impl std::fmt::Display for Page {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// The full field-to-page mapping.
///
/// Wire shape: `{"1": ["about_me", ...], "2": [...], "3": [...]}`.
/// Field order within a page is the order the admin assigned them and is
/// preserved through persistence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentSet {
    #[serde(rename = "1", default)]
    pub one: Vec<FieldKey>,
    #[serde(rename = "2", default)]
    pub two: Vec<FieldKey>,
    #[serde(rename = "3", default)]
    pub three: Vec<FieldKey>,
}

impl AssignmentSet {
    /// The keys assigned to `page`.
    pub fn page(&self, page: Page) -> &[FieldKey] {
        match page {
            Page::One => &self.one,
            Page::Two => &self.two,
            Page::Three => &self.three,
        }
    }

    fn page_mut(&mut self, page: Page) -> &mut Vec<FieldKey> {
        match page {
            Page::One => &mut self.one,
            Page::Two => &mut self.two,
            Page::Three => &mut self.three,
        }
    }

    /// The page currently holding `key`, if any.
    pub fn page_of(&self, key: FieldKey) -> Option<Page> {
        Page::ALL
            .into_iter()
            .find(|page| self.page(*page).contains(&key))
    }

    /// Total number of assignment rows (counting duplicates, which only a
    /// transient working copy can contain).
    pub fn len(&self) -> usize {
        self.one.len() + self.two.len() + self.three.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Move `key` onto `target`, removing it from wherever it currently
    /// lives. This is the only transform the editor uses to check a field
    /// on, so exclusivity holds at every point of an editing session.
    /// Applying it twice with the same arguments is a no-op the second time.
    pub fn move_field(&mut self, key: FieldKey, target: Page) {
        self.remove_field(key);
        self.page_mut(target).push(key);
    }

    /// Remove `key` from every page. Unchecking may leave the set
    /// incomplete; that is allowed until submit.
    pub fn remove_field(&mut self, key: FieldKey) {
        for page in Page::ALL {
            self.page_mut(page).retain(|k| *k != key);
        }
    }

    /// Whether two sets assign the same keys to the same pages, ignoring
    /// order within a page.
    pub fn same_grouping(&self, other: &AssignmentSet) -> bool {
        Page::ALL.into_iter().all(|page| {
            let mut a: Vec<_> = self.page(page).to_vec();
            let mut b: Vec<_> = other.page(page).to_vec();
            a.sort();
            b.sort();
            a == b
        })
    }
}

/// A constraint violation found by [`validate`].
///
/// Tagged result, not an error type: expected violations are part of the
/// editing workflow and are surfaced to the admin, not propagated as
/// failures. `Display` renders the user-facing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    /// A page has no fields assigned.
    EmptyPage { page: Page },
    /// A field is assigned to more than one page (or twice to one).
    DuplicateAssignment { key: FieldKey, pages: Vec<Page> },
    /// Registry fields missing from every page.
    MissingFields { keys: Vec<FieldKey> },
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyPage { .. } => {
                write!(f, "Please select at least one field per page before saving.")
            }
            Self::DuplicateAssignment { .. } => write!(
                f,
                "Each field can only be assigned to one page. Duplicate assignments detected."
            ),
            Self::MissingFields { keys } => {
                let joined: Vec<&str> = keys.iter().map(|k| k.as_str()).collect();
                write!(f, "Missing required fields: {}", joined.join(", "))
            }
        }
    }
}

/// Validate a set against the registry.
///
/// Returns the first violation in a fixed order: empty pages, then
/// duplicate assignments, then missing fields. A set that passes holds all
/// three invariants: non-emptiness, exclusivity, and completeness.
pub fn validate(set: &AssignmentSet, registry: &[FieldSpec]) -> Result<(), Violation> {
    for page in Page::ALL {
        if set.page(page).is_empty() {
            return Err(Violation::EmptyPage { page });
        }
    }

    for spec in registry {
        let mut pages = Vec::new();
        let mut occurrences = 0usize;
        for page in Page::ALL {
            let count = set.page(page).iter().filter(|k| **k == spec.key).count();
            if count > 0 {
                pages.push(page);
            }
            occurrences += count;
        }
        if occurrences > 1 {
            return Err(Violation::DuplicateAssignment {
                key: spec.key,
                pages,
            });
        }
    }

    let missing: Vec<FieldKey> = registry
        .iter()
        .map(|spec| spec.key)
        .filter(|key| set.page_of(*key).is_none())
        .collect();
    if !missing.is_empty() {
        return Err(Violation::MissingFields { keys: missing });
    }

    Ok(())
}

/// The specs assigned to `page`, in the set's stored order.
///
/// Keys in the set always resolve — the registry is total over `FieldKey`.
pub fn fields_for_page(set: &AssignmentSet, page: Page) -> Vec<&'static FieldSpec> {
    set.page(page).iter().map(|key| spec_for(*key)).collect()
}
