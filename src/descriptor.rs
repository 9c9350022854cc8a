use metrics::Key;

use crate::number::NumberKind;

/// Declared role of a metric source.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InstrumentKind {
    /// Monotonic accumulation.
    Counter,
    /// Gauge-like, the last reported value wins.
    Observer,
    /// Distribution of individual observations.
    Measure,
}

/// Identifies a registered instrument.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Descriptor {
    name: String,
    instrument_kind: InstrumentKind,
    number_kind: NumberKind,
}

impl Descriptor {
    pub fn new<N>(name: N, instrument_kind: InstrumentKind, number_kind: NumberKind) -> Self
    where
        N: Into<String>,
    {
        Descriptor {
            name: name.into(),
            instrument_kind,
            number_kind,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn instrument_kind(&self) -> InstrumentKind {
        self.instrument_kind
    }

    pub fn number_kind(&self) -> NumberKind {
        self.number_kind
    }
}

/// Ordered key/value pairs attached to a single record.
///
/// Iteration yields labels in insertion order, and indices are stable for the lifetime of
/// the set.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LabelSet {
    labels: Vec<(String, String)>,
}

impl LabelSet {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.push(key, value);
        self
    }

    pub fn push<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.labels.push((key.into(), value.into()));
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.labels.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl From<&Key> for LabelSet {
    fn from(key: &Key) -> Self {
        let mut set = LabelSet::new();
        for label in key.labels() {
            set.push(label.key(), label.value());
        }
        set
    }
}

impl<K, V> FromIterator<(K, V)> for LabelSet
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut set = LabelSet::new();
        for (k, v) in iter {
            set.push(k, v);
        }
        set
    }
}
