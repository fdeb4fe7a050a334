//! Content-based categorization of occurrences.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::feed::SourceKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryKind {
    Personal,
    Course,
    Exam,
    Meeting,
    Event,
    General,
}

impl CategoryKind {
    pub fn id(&self) -> &'static str {
        match self {
            CategoryKind::Personal => "personal",
            CategoryKind::Course => "course",
            CategoryKind::Exam => "exam",
            CategoryKind::Meeting => "meeting",
            CategoryKind::Event => "event",
            CategoryKind::General => "general",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CategoryKind::Personal => "Personal",
            CategoryKind::Course => "Course",
            CategoryKind::Exam => "Exam",
            CategoryKind::Meeting => "Meeting",
            CategoryKind::Event => "Event",
            CategoryKind::General => "General",
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            CategoryKind::Personal => "#34c759",
            CategoryKind::Course => "#007aff",
            CategoryKind::Exam => "#ff3b30",
            CategoryKind::Meeting => "#af52de",
            CategoryKind::Event => "#ff9500",
            CategoryKind::General => "#8e8e93",
        }
    }
}

impl fmt::Display for CategoryKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Category attached to every occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: CategoryKind,
    pub name: String,
    pub color: String,
    pub source_kind: SourceKind,
}

impl Category {
    pub fn new(kind: CategoryKind, source_kind: SourceKind) -> Self {
        Category {
            id: kind,
            name: kind.name().to_string(),
            color: kind.color().to_string(),
            source_kind,
        }
    }
}

/// Keyword sets in priority order. A keyword matches any word starting
/// with it, so `tp` matches `tp1` and `exam` matches `exams`.
const KEYWORDS: &[(CategoryKind, &[&str])] = &[
    (
        CategoryKind::Course,
        &[
            "cours", "td", "tp", "cm", "amphi", "lecture", "lesson", "class", "tutorial",
        ],
    ),
    (
        CategoryKind::Exam,
        &[
            "exam",
            "partiel",
            "contrôle",
            "controle",
            "interro",
            "quiz",
            "soutenance",
            "test",
        ],
    ),
    (
        CategoryKind::Meeting,
        &[
            "réunion", "reunion", "meeting", "rdv", "rendez", "entretien", "visio", "call",
        ],
    ),
    (
        CategoryKind::Event,
        &[
            "atelier",
            "workshop",
            "conférence",
            "conference",
            "séminaire",
            "seminaire",
            "seminar",
            "forum",
            "salon",
            "soirée",
            "soiree",
            "webinar",
            "événement",
            "evenement",
            "event",
        ],
    ),
];

/// Resolve the category of an occurrence.
///
/// iCloud feeds are personal calendars and are not inspected.
pub fn categorize(title: &str, description: Option<&str>, source_kind: SourceKind) -> Category {
    if source_kind == SourceKind::Icloud {
        return Category::new(CategoryKind::Personal, source_kind);
    }

    let text = format!("{} {}", title, description.unwrap_or_default()).to_lowercase();
    let words: Vec<&str> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    let kind = KEYWORDS
        .iter()
        .find(|(_, keywords)| {
            words
                .iter()
                .any(|word| keywords.iter().any(|k| word.starts_with(k)))
        })
        .map(|(kind, _)| *kind)
        .unwrap_or(CategoryKind::General);

    Category::new(kind, source_kind)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind(title: &str, description: Option<&str>) -> CategoryKind {
        categorize(title, description, SourceKind::Outlook).id
    }

    #[test]
    fn test_icloud_is_always_personal() {
        let category = categorize("Partiel de maths", None, SourceKind::Icloud);
        assert_eq!(category.id, CategoryKind::Personal);
        assert_eq!(category.source_kind, SourceKind::Icloud);
    }

    #[test]
    fn test_keyword_sets() {
        assert_eq!(kind("Cours [TP1]", None), CategoryKind::Course);
        assert_eq!(kind("Partiel Algèbre", None), CategoryKind::Exam);
        assert_eq!(kind("Réunion budget", None), CategoryKind::Meeting);
        assert_eq!(kind("Atelier CV", None), CategoryKind::Event);
        assert_eq!(kind("Déjeuner", None), CategoryKind::General);
    }

    #[test]
    fn test_prefix_matching() {
        assert_eq!(kind("TP1 réseaux", None), CategoryKind::Course);
        assert_eq!(kind("Final exams", None), CategoryKind::Exam);
    }

    #[test]
    fn test_keywords_match_whole_word_starts_only() {
        // "call" only appears inside "recall"
        assert_eq!(kind("Recall contact", None), CategoryKind::General);
    }

    #[test]
    fn test_priority_order() {
        // Both a course and an exam keyword: course wins
        assert_eq!(kind("Cours + interro", None), CategoryKind::Course);
        // Meeting beats event
        assert_eq!(kind("Visio forum", None), CategoryKind::Meeting);
    }

    #[test]
    fn test_description_is_inspected() {
        assert_eq!(
            kind("Point hebdo", Some("Rendez-vous en salle B12")),
            CategoryKind::Meeting
        );
    }

    #[test]
    fn test_categorize_is_deterministic() {
        let a = categorize("Soutenance", Some("Salle 3"), SourceKind::Outlook);
        let b = categorize("Soutenance", Some("Salle 3"), SourceKind::Outlook);
        assert_eq!(a, b);
        assert_eq!(a.color, CategoryKind::Exam.color());
    }
}
