//! Component identities and the immutable state snapshot handed to observers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A component that adds water to the tank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Source {
    /// Rainwater collected from the roof
    Pluvial,
    /// Ground-level cistern, pumped up
    Cisterna,
}

/// An outlet that draws water from the tank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Consumer {
    Jardin,
    Lavadero,
    Banio,
}

impl Source {
    pub const ALL: [Source; 2] = [Source::Pluvial, Source::Cisterna];

    pub fn name(&self) -> &'static str {
        match self {
            Source::Pluvial => "Pluvial",
            Source::Cisterna => "Cisterna",
        }
    }
}

impl Consumer {
    pub const ALL: [Consumer; 3] = [Consumer::Jardin, Consumer::Lavadero, Consumer::Banio];

    pub fn name(&self) -> &'static str {
        match self {
            Consumer::Jardin => "Jardin",
            Consumer::Lavadero => "Lavadero",
            Consumer::Banio => "Banio",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for Consumer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of the most recent attempt by each source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SourceFlags {
    pub pluvial: bool,
    pub cisterna: bool,
}

/// Outcome of the most recent attempt by each consumer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ConsumerFlags {
    pub jardin: bool,
    pub lavadero: bool,
    pub banio: bool,
}

impl SourceFlags {
    pub fn get(&self, source: Source) -> bool {
        match source {
            Source::Pluvial => self.pluvial,
            Source::Cisterna => self.cisterna,
        }
    }

    pub(crate) fn set(&mut self, source: Source, value: bool) {
        match source {
            Source::Pluvial => self.pluvial = value,
            Source::Cisterna => self.cisterna = value,
        }
    }
}

impl ConsumerFlags {
    pub fn get(&self, consumer: Consumer) -> bool {
        match consumer {
            Consumer::Jardin => self.jardin,
            Consumer::Lavadero => self.lavadero,
            Consumer::Banio => self.banio,
        }
    }

    pub(crate) fn set(&mut self, consumer: Consumer, value: bool) {
        match consumer {
            Consumer::Jardin => self.jardin = value,
            Consumer::Lavadero => self.lavadero = value,
            Consumer::Banio => self.banio = value,
        }
    }

    /// True if at least one outlet drew water on its last attempt.
    pub fn any(&self) -> bool {
        self.jardin || self.lavadero || self.banio
    }
}

/// State of the whole tank captured in one critical section.
///
/// A snapshot is a plain value: it owns copies of every flag and never
/// observes later mutations, so it can be read, logged, or serialized
/// without touching the lock again.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Litres in the tank
    pub level: f64,
    /// `level / capacity_max * 100`
    pub percentage: f64,
    pub pump_active: bool,
    pub sources: SourceFlags,
    pub consumers: ConsumerFlags,
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.1}L ({:.1}%) pump={}",
            self.level,
            self.percentage,
            if self.pump_active { "on" } else { "off" }
        )?;
        for source in Source::ALL {
            if self.sources.get(source) {
                write!(f, " +{}", source)?;
            }
        }
        for consumer in Consumer::ALL {
            if self.consumers.get(consumer) {
                write!(f, " -{}", consumer)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consumer_flags_any() {
        let mut flags = ConsumerFlags::default();
        assert!(!flags.any());
        flags.set(Consumer::Lavadero, true);
        assert!(flags.any());
        assert!(flags.get(Consumer::Lavadero));
        assert!(!flags.get(Consumer::Banio));
    }

    #[test]
    fn test_snapshot_serializes_with_component_names() {
        let snapshot = Snapshot {
            level: 330.0,
            percentage: 33.0,
            pump_active: true,
            sources: SourceFlags {
                pluvial: false,
                cisterna: true,
            },
            consumers: ConsumerFlags::default(),
        };
        let json = serde_json::to_value(snapshot).unwrap();
        assert_eq!(json["sources"]["Cisterna"], true);
        assert_eq!(json["consumers"]["Jardin"], false);
        assert_eq!(json["pump_active"], true);
    }

    #[test]
    fn test_snapshot_display_lists_active_components() {
        let snapshot = Snapshot {
            level: 600.0,
            percentage: 60.0,
            pump_active: false,
            sources: SourceFlags::default(),
            consumers: ConsumerFlags {
                jardin: true,
                lavadero: false,
                banio: true,
            },
        };
        assert_eq!(snapshot.to_string(), "600.0L (60.0%) pump=off -Jardin -Banio");
    }
}
