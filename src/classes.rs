use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClassDef {
    pub id: &'static str,
    pub label: &'static str,
    pub description: &'static str,
}

/// Fixed class list for the school. Order matters: positional hints ("Grade 3")
/// index into it 1-based, and the first entry is the fallback.
pub const DIRECTORY: &[ClassDef] = &[
    ClassDef {
        id: "C1",
        label: "Kindergarten",
        description: "Ages 4-6, first prayers and bible stories",
    },
    ClassDef {
        id: "C2",
        label: "Primary",
        description: "Ages 7-9, reading and memory verses",
    },
    ClassDef {
        id: "C3",
        label: "Junior",
        description: "Ages 10-12, church history and hymns",
    },
    ClassDef {
        id: "C4",
        label: "Intermediate",
        description: "Ages 13-15, doctrine and sacraments",
    },
    ClassDef {
        id: "C5",
        label: "Youth",
        description: "Ages 16-18, youth fellowship",
    },
    ClassDef {
        id: "C6",
        label: "Adult",
        description: "Adult catechism",
    },
];

pub fn find(class_id: &str) -> Option<&'static ClassDef> {
    DIRECTORY.iter().find(|c| c.id == class_id)
}

pub fn is_known(class_id: &str) -> bool {
    find(class_id).is_some()
}

pub fn label_of(class_id: &str) -> &str {
    find(class_id).map(|c| c.label).unwrap_or(class_id)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ClassMatchKind {
    /// The caller chose the class for the whole import.
    Pinned,
    /// Hint equals a class id.
    Id,
    /// Exactly one label matched the hint.
    Label,
    /// Several labels matched; the first in directory order was taken.
    LabelAmbiguous,
    /// First integer in the hint, used as a 1-based directory position.
    Position,
    /// Nothing matched; first class in the directory.
    Fallback,
}

impl ClassMatchKind {
    /// Whether the UI should flag the row for review.
    pub fn is_guess(self) -> bool {
        matches!(
            self,
            ClassMatchKind::LabelAmbiguous | ClassMatchKind::Fallback
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassMatch {
    pub class_id: &'static str,
    pub kind: ClassMatchKind,
}

/// Resolves a free-text class cell. Never fails: the last step is the
/// directory's first class.
pub fn resolve_hint(hint: &str) -> ClassMatch {
    let needle = hint.trim().to_lowercase();
    if needle.is_empty() {
        return fallback();
    }

    if let Some(c) = DIRECTORY.iter().find(|c| c.id.to_lowercase() == needle) {
        return ClassMatch {
            class_id: c.id,
            kind: ClassMatchKind::Id,
        };
    }

    let labels: Vec<&ClassDef> = DIRECTORY
        .iter()
        .filter(|c| {
            let label = c.label.to_lowercase();
            label.contains(&needle) || needle.contains(&label)
        })
        .collect();
    if let Some(first) = labels.first() {
        return ClassMatch {
            class_id: first.id,
            kind: if labels.len() == 1 {
                ClassMatchKind::Label
            } else {
                ClassMatchKind::LabelAmbiguous
            },
        };
    }

    if let Some(n) = first_integer(&needle) {
        if n >= 1 && n <= DIRECTORY.len() {
            return ClassMatch {
                class_id: DIRECTORY[n - 1].id,
                kind: ClassMatchKind::Position,
            };
        }
    }

    fallback()
}

/// Pinned classes bypass the hint entirely.
pub fn pinned(class_id: &'static str) -> ClassMatch {
    ClassMatch {
        class_id,
        kind: ClassMatchKind::Pinned,
    }
}

fn fallback() -> ClassMatch {
    ClassMatch {
        class_id: DIRECTORY[0].id,
        kind: ClassMatchKind::Fallback,
    }
}

fn first_integer(s: &str) -> Option<usize> {
    let digits: String = s
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_id_is_case_insensitive() {
        let m = resolve_hint("c4");
        assert_eq!(m.class_id, "C4");
        assert_eq!(m.kind, ClassMatchKind::Id);
    }

    #[test]
    fn label_substring_either_direction() {
        assert_eq!(resolve_hint("youth group").class_id, "C5");
        assert_eq!(resolve_hint("PRIM").class_id, "C2");
        assert_eq!(resolve_hint("prim").kind, ClassMatchKind::Label);
    }

    #[test]
    fn ambiguous_label_is_flagged() {
        // "a" hits several labels.
        let m = resolve_hint("a");
        assert_eq!(m.kind, ClassMatchKind::LabelAmbiguous);
        assert!(m.kind.is_guess());
        assert!(is_known(m.class_id));
    }

    #[test]
    fn position_from_first_integer() {
        let m = resolve_hint("Grade 3 (morning)");
        assert_eq!(m.class_id, "C3");
        assert_eq!(m.kind, ClassMatchKind::Position);
    }

    #[test]
    fn out_of_range_position_falls_back() {
        let m = resolve_hint("Grade 12");
        assert_eq!(m.class_id, "C1");
        assert_eq!(m.kind, ClassMatchKind::Fallback);
        assert_eq!(resolve_hint("").kind, ClassMatchKind::Fallback);
        assert_eq!(resolve_hint("Grade 0").kind, ClassMatchKind::Fallback);
    }

    #[test]
    fn every_hint_resolves_to_a_known_class() {
        for hint in [
            "", " ", "???", "99", "-1", "Kinder", "adult choir", "C6", "c9", "x7y2", "ümlaut",
        ] {
            let m = resolve_hint(hint);
            assert!(is_known(m.class_id), "hint {hint:?} gave {}", m.class_id);
        }
    }
}
