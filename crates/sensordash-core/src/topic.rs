//! Topic parsing, location labels and ignore filtering.

#![allow(missing_docs)]

use indexmap::IndexMap;
use smol_str::SmolStr;

use crate::registry::{self, SensorKind, SensorTypeDescriptor};

/// Built-in human labels per location prefix.
pub const LOCATION_LABELS: &[(&str, &str)] = &[
    ("home/salon", "Salón"),
    ("home/terraza", "Terraza"),
    ("home/habitacion", "Habitación"),
    ("home/estudio", "Estudio"),
    ("home/entrada", "Entrada"),
];

/// Built-in ignore entries (diagnostic/test topics).
pub const IGNORED_TOPICS: &[&str] = &["/test", "test"];

/// A topic split into location and measurement, with its resolved label and
/// sensor type.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedReading {
    pub topic: SmolStr,
    pub location: SmolStr,
    pub location_label: SmolStr,
    pub measurement: SmolStr,
    /// `None` when no descriptor matches: the reading is unroutable.
    pub sensor_type: Option<&'static SensorTypeDescriptor>,
}

impl ClassifiedReading {
    #[must_use]
    pub fn is_routable(&self) -> bool {
        self.sensor_type.is_some()
    }

    #[must_use]
    pub fn kind(&self) -> Option<SensorKind> {
        self.sensor_type.map(|descriptor| descriptor.kind)
    }
}

/// Splits a topic on its last `/`. A topic without separator has an empty
/// location.
#[must_use]
pub fn split_topic(topic: &str) -> (&str, &str) {
    match topic.rfind('/') {
        Some(index) => (&topic[..index], &topic[index + 1..]),
        None => ("", topic),
    }
}

#[derive(Debug, Clone)]
pub struct TopicClassifier {
    location_labels: IndexMap<SmolStr, SmolStr>,
    ignored: Vec<SmolStr>,
}

impl Default for TopicClassifier {
    fn default() -> Self {
        Self {
            location_labels: LOCATION_LABELS
                .iter()
                .map(|(location, label)| (SmolStr::new(location), SmolStr::new(label)))
                .collect(),
            ignored: IGNORED_TOPICS.iter().map(SmolStr::new).collect(),
        }
    }
}

impl TopicClassifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a location label.
    #[must_use]
    pub fn with_label(mut self, location: impl Into<SmolStr>, label: impl Into<SmolStr>) -> Self {
        self.location_labels.insert(location.into(), label.into());
        self
    }

    /// Adds an ignore entry.
    #[must_use]
    pub fn with_ignored(mut self, entry: impl Into<SmolStr>) -> Self {
        let entry = entry.into();
        if !self.ignored.contains(&entry) {
            self.ignored.push(entry);
        }
        self
    }

    /// True when `topic` equals an ignore entry or ends with `/entry`.
    #[must_use]
    pub fn should_ignore(&self, topic: &str) -> bool {
        self.ignored.iter().any(|entry| {
            topic == entry.as_str()
                || topic
                    .strip_suffix(entry.as_str())
                    .is_some_and(|rest| rest.ends_with('/'))
        })
    }

    #[must_use]
    pub fn location_label<'a>(&'a self, location: &'a str) -> &'a str {
        self.location_labels
            .get(location)
            .map_or(location, SmolStr::as_str)
    }

    #[must_use]
    pub fn classify(&self, topic: &str) -> ClassifiedReading {
        let (location, measurement) = split_topic(topic);
        ClassifiedReading {
            topic: SmolStr::new(topic),
            location: SmolStr::new(location),
            location_label: SmolStr::new(self.location_label(location)),
            measurement: SmolStr::new(measurement),
            sensor_type: registry::resolve(measurement),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_last_separator() {
        assert_eq!(split_topic("home/salon/temp"), ("home/salon", "temp"));
        assert_eq!(split_topic("temp"), ("", "temp"));
        assert_eq!(split_topic("home/salon/"), ("home/salon", ""));
    }

    #[test]
    fn classifies_known_topics() {
        let classifier = TopicClassifier::default();
        let reading = classifier.classify("home/salon/temp");
        assert_eq!(reading.location, "home/salon");
        assert_eq!(reading.location_label, "Salón");
        assert_eq!(reading.measurement, "temp");
        assert_eq!(reading.kind(), Some(SensorKind::Continuous));
    }

    #[test]
    fn unknown_location_falls_back_to_raw() {
        let reading = TopicClassifier::default().classify("office/door");
        assert_eq!(reading.location_label, "office");
        assert_eq!(reading.kind(), Some(SensorKind::Discrete));
    }

    #[test]
    fn unknown_measurement_is_unroutable() {
        let reading = TopicClassifier::default().classify("home/garage/humidity");
        assert!(!reading.is_routable());
        assert_eq!(reading.location_label, "home/garage");
    }

    #[test]
    fn ignore_filter_matches_whole_segments() {
        let classifier = TopicClassifier::default();
        assert!(classifier.should_ignore("test"));
        assert!(classifier.should_ignore("/test"));
        assert!(classifier.should_ignore("home/salon/test"));
        assert!(classifier.should_ignore("home//test"));
        assert!(!classifier.should_ignore("home/salon/contest"));
        assert!(!classifier.should_ignore("home/salon/temp"));
    }

    #[test]
    fn extra_labels_and_ignores() {
        let classifier = TopicClassifier::new()
            .with_label("home/garage", "Garaje")
            .with_ignored("debug");
        assert_eq!(classifier.classify("home/garage/temp").location_label, "Garaje");
        assert!(classifier.should_ignore("home/garage/debug"));
    }
}
