//! The census subject taxonomy seeded by default.

use crate::model::NewTopic;

pub const CENSUS_TITLE: &str = "Census";

const CENSUS_SUBTOPICS: [&str; 12] = [
    "Ageing",
    "Demography",
    "Education",
    "Equalities",
    "Ethnic group, national identity, language and religion",
    "Historical census",
    "Housing",
    "International migration",
    "Labour market",
    "Sexual orientation and gender identity",
    "Travel to work",
    "Veterans",
];

pub fn census_parent() -> NewTopic {
    NewTopic::new(CENSUS_TITLE, CENSUS_TITLE)
}

/// Each subtopic uses its title as its description.
pub fn census_subtopics() -> Vec<NewTopic> {
    CENSUS_SUBTOPICS
        .iter()
        .map(|title| NewTopic::new(*title, *title))
        .collect()
}
