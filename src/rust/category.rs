//! Meal-course lookup for ImageNet food labels.
//!
//! Labels are matched verbatim, synonyms included: `"hotdog, hot dog, red hot"`
//! is one label, not three.

use std::collections::HashSet;
use std::fmt;

use lazy_static::lazy_static;
use serde::Serialize;

/// Labels served as appetizers.
pub const APPETIZER_LABELS: &[&str] = &[
    "bagel, beigel",
    "guacamole",
    "soup bowl",
    "French loaf",
    "pretzel",
    "consomme",
    "cheeseburger",
    "hotdog, hot dog, red hot",
];

/// Labels served as a main course.
pub const MAIN_COURSE_LABELS: &[&str] = &[
    "American lobster, Northern lobster, Maine lobster, Homarus americanus",
    "hot pot, hotpot",
    "rotisserie",
    "potpie",
    "carbonara",
    "pizza, pizza pie",
    "meat loaf, meatloaf",
];

/// Labels served as dessert.
pub const DESSERT_LABELS: &[&str] = &[
    "trifle",
    "ice cream, icecream",
    "ice lolly, lolly, lollipop, popsicle",
    "strawberry",
    "chocolate sauce, chocolate syrup",
];

lazy_static! {
    static ref APPETIZERS: HashSet<&'static str> = APPETIZER_LABELS.iter().copied().collect();
    static ref MAIN_COURSES: HashSet<&'static str> = MAIN_COURSE_LABELS.iter().copied().collect();
    static ref DESSERTS: HashSet<&'static str> = DESSERT_LABELS.iter().copied().collect();
}

/// Coarse meal course derived from a classifier label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CategoryTag {
    Appetizer,
    MainCourse,
    Dessert,
    Unclassified,
}

impl CategoryTag {
    /// Text shown next to the top prediction, `None` when nothing should be shown.
    pub fn annotation(&self) -> Option<&'static str> {
        match self {
            CategoryTag::Appetizer => Some("Appetizer"),
            CategoryTag::MainCourse => Some("Main Course"),
            CategoryTag::Dessert => Some("Dessert"),
            CategoryTag::Unclassified => None,
        }
    }

    pub fn is_classified(&self) -> bool {
        !matches!(self, CategoryTag::Unclassified)
    }
}

impl fmt::Display for CategoryTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.annotation().unwrap_or("Unclassified"))
    }
}

/// Looks up the meal course of an exact (case-sensitive) classifier label.
pub fn category_of(label: &str) -> CategoryTag {
    if APPETIZERS.contains(label) {
        CategoryTag::Appetizer
    } else if MAIN_COURSES.contains(label) {
        CategoryTag::MainCourse
    } else if DESSERTS.contains(label) {
        CategoryTag::Dessert
    } else {
        CategoryTag::Unclassified
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_table_label_maps_to_its_category() {
        for label in APPETIZER_LABELS {
            assert_eq!(category_of(label), CategoryTag::Appetizer, "{}", label);
        }
        for label in MAIN_COURSE_LABELS {
            assert_eq!(category_of(label), CategoryTag::MainCourse, "{}", label);
        }
        for label in DESSERT_LABELS {
            assert_eq!(category_of(label), CategoryTag::Dessert, "{}", label);
        }
    }

    #[test]
    fn test_unknown_labels_are_unclassified() {
        for label in ["bicycle", "", "pizza", "Strawberry", "hot dog", "french loaf", " trifle"] {
            assert_eq!(category_of(label), CategoryTag::Unclassified, "{:?}", label);
        }
    }

    #[test]
    fn test_synonym_lists_match_only_as_a_whole() {
        assert_eq!(category_of("hotdog, hot dog, red hot"), CategoryTag::Appetizer);
        assert_eq!(category_of("hotdog"), CategoryTag::Unclassified);
        assert_eq!(category_of("red hot"), CategoryTag::Unclassified);
    }

    #[test]
    fn test_tables_do_not_overlap() {
        let total = APPETIZER_LABELS.len() + MAIN_COURSE_LABELS.len() + DESSERT_LABELS.len();
        let all: HashSet<&str> = APPETIZER_LABELS
            .iter()
            .chain(MAIN_COURSE_LABELS)
            .chain(DESSERT_LABELS)
            .copied()
            .collect();
        assert_eq!(all.len(), total);
    }

    #[test]
    fn test_annotation_text() {
        assert_eq!(CategoryTag::MainCourse.annotation(), Some("Main Course"));
        assert_eq!(CategoryTag::Unclassified.annotation(), None);
        assert_eq!(CategoryTag::Dessert.to_string(), "Dessert");
        assert!(!CategoryTag::Unclassified.is_classified());
    }
}
