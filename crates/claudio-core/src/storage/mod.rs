pub mod analytics;
pub mod filter;
pub mod sqlite;
pub mod tracker;

pub use analytics::{CategoryCount, LevelCount, MissingSound, SoundUsage, ToolStat, UsageSummary};
pub use filter::{AnalyticsFilter, OrderBy, SortOrder, TimeBounds, TimePreset, TimeWindow};
pub use sqlite::{NewEvent, PathLookup, SoundDb, StoredEvent, SCHEMA_VERSION};
pub use tracker::{DbLocation, Tracker};
