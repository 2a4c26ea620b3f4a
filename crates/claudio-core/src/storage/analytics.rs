//! Read-only analytics over recorded lookups.

use rusqlite::params_from_iter;
use rusqlite::types::Value;
use serde::Serialize;

use super::filter::{AnalyticsFilter, OrderBy, TimeBounds};
use super::sqlite::SoundDb;
use crate::error::{ClaudioError, Result};
use crate::model::EventCategory;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MissingSound {
    pub path: String,
    pub misses: i64,
    pub last_seen: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SoundUsage {
    pub path: String,
    pub uses: i64,
    pub avg_fallback_level: f64,
    pub last_used: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolStat {
    pub tool: String,
    pub events: i64,
    pub unique_sounds: i64,
    pub avg_fallback_level: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryCount {
    pub category: EventCategory,
    pub count: i64,
    pub percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LevelCount {
    pub level: i64,
    pub count: i64,
    pub percent: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UsageSummary {
    pub total_events: i64,
    pub unique_sounds: i64,
    pub unique_sessions: i64,
    pub total_lookups: i64,
    pub missing_lookups: i64,
    pub avg_fallback_level: f64,
    pub fallback_histogram: Vec<LevelCount>,
}

/// SQL conditions on `hook_events e` plus their positional parameters.
struct EventWhere {
    sql: String,
    params: Vec<Value>,
}

impl EventWhere {
    fn build(filter: &AnalyticsFilter) -> Result<Self> {
        let bounds = filter.window.resolve()?;
        Ok(Self::with_bounds(filter, bounds))
    }

    fn with_bounds(filter: &AnalyticsFilter, bounds: TimeBounds) -> Self {
        let mut clauses: Vec<&str> = Vec::new();
        let mut params: Vec<Value> = Vec::new();

        if let Some(start) = bounds.start {
            clauses.push("e.timestamp >= ?");
            params.push(Value::Integer(start));
        }
        if let Some(end) = bounds.end {
            clauses.push("e.timestamp < ?");
            params.push(Value::Integer(end));
        }
        if let Some(tool) = &filter.tool {
            clauses.push("e.tool_name = ? COLLATE NOCASE");
            params.push(Value::Text(tool.clone()));
        }
        if let Some(category) = filter.category {
            clauses.push("json_extract(e.context, '$.category') = ?");
            params.push(Value::Integer(i64::from(category.code())));
        }
        if let Some(soundpack) = &filter.soundpack {
            clauses.push("json_extract(e.context, '$.soundpack') = ?");
            params.push(Value::Text(soundpack.clone()));
        }
        if let Some(session) = &filter.session {
            clauses.push("e.session_id = ?");
            params.push(Value::Text(session.clone()));
        }

        let sql = if clauses.is_empty() {
            "1 = 1".to_string()
        } else {
            clauses.join(" AND ")
        };
        Self { sql, params }
    }

    /// Parameters followed by LIMIT/OFFSET values.
    fn paged(&self, filter: &AnalyticsFilter) -> Vec<Value> {
        let limit = filter.limit.map_or(-1, |l| l as i64);
        let mut params = self.params.clone();
        params.push(Value::Integer(limit));
        params.push(Value::Integer(filter.offset as i64));
        params
    }
}

fn percent(count: i64, total: i64) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 * 100.0 / total as f64
    }
}

impl SoundDb {
    /// Logical paths that were checked and not found, most-missed first.
    pub fn missing_sounds(&self, filter: &AnalyticsFilter) -> Result<Vec<MissingSound>> {
        let w = EventWhere::build(filter)?;
        let order = match filter.order_by {
            OrderBy::Count => "misses",
            OrderBy::Recent => "last_seen",
            OrderBy::Name => "l.path",
        };
        let sql = format!(
            "SELECT l.path, COUNT(*) AS misses, MAX(e.timestamp) AS last_seen
             FROM path_lookups l
             JOIN hook_events e ON e.id = l.event_id
             WHERE l.found = 0 AND {}
             GROUP BY l.path
             ORDER BY {order} {}, l.path ASC
             LIMIT ? OFFSET ?",
            w.sql,
            filter.order.sql(),
        );

        let mut stmt = self.conn().prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(w.paged(filter)), |row| {
            Ok(MissingSound {
                path: row.get(0)?,
                misses: row.get(1)?,
                last_seen: row.get(2)?,
            })
        })?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(ClaudioError::from)
    }

    /// How often each selected sound was played.
    pub fn sound_usage(&self, filter: &AnalyticsFilter) -> Result<Vec<SoundUsage>> {
        let w = EventWhere::build(filter)?;
        let order = match filter.order_by {
            OrderBy::Count => "uses",
            OrderBy::Recent => "last_used",
            OrderBy::Name => "e.selected_path",
        };
        let sql = format!(
            "SELECT e.selected_path, COUNT(*) AS uses, AVG(e.fallback_level), MAX(e.timestamp) AS last_used
             FROM hook_events e
             WHERE {}
             GROUP BY e.selected_path
             ORDER BY {order} {}, e.selected_path ASC
             LIMIT ? OFFSET ?",
            w.sql,
            filter.order.sql(),
        );

        let mut stmt = self.conn().prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(w.paged(filter)), |row| {
            Ok(SoundUsage {
                path: row.get(0)?,
                uses: row.get(1)?,
                avg_fallback_level: row.get(2)?,
                last_used: row.get(3)?,
            })
        })?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(ClaudioError::from)
    }

    /// Totals for the filtered window. Paging does not apply.
    pub fn usage_summary(&self, filter: &AnalyticsFilter) -> Result<UsageSummary> {
        let w = EventWhere::build(filter)?;

        let (total_events, unique_sounds, unique_sessions, avg) = self.conn().query_row(
            &format!(
                "SELECT COUNT(*), COUNT(DISTINCT e.selected_path), COUNT(DISTINCT e.session_id),
                        AVG(e.fallback_level)
                 FROM hook_events e WHERE {}",
                w.sql
            ),
            params_from_iter(w.params.iter()),
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, Option<f64>>(3)?,
                ))
            },
        )?;

        let (total_lookups, missing_lookups) = self.conn().query_row(
            &format!(
                "SELECT COUNT(*), COALESCE(SUM(l.found = 0), 0)
                 FROM path_lookups l
                 JOIN hook_events e ON e.id = l.event_id
                 WHERE {}",
                w.sql
            ),
            params_from_iter(w.params.iter()),
            |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)),
        )?;

        let histogram_filter = AnalyticsFilter {
            limit: None,
            offset: 0,
            ..filter.clone()
        };

        Ok(UsageSummary {
            total_events,
            unique_sounds,
            unique_sessions,
            total_lookups,
            missing_lookups,
            avg_fallback_level: avg.unwrap_or(0.0),
            fallback_histogram: self.fallback_distribution(&histogram_filter)?,
        })
    }

    /// Per-tool event counts, keyed by the context's effective tool name.
    pub fn tool_stats(&self, filter: &AnalyticsFilter) -> Result<Vec<ToolStat>> {
        let w = EventWhere::build(filter)?;
        let order = match filter.order_by {
            OrderBy::Count => "events",
            OrderBy::Recent => "MAX(e.timestamp)",
            OrderBy::Name => "tool",
        };
        let sql = format!(
            "SELECT json_extract(e.context, '$.tool_name') AS tool, COUNT(*) AS events,
                    COUNT(DISTINCT e.selected_path), AVG(e.fallback_level)
             FROM hook_events e
             WHERE {} AND COALESCE(json_extract(e.context, '$.tool_name'), '') != ''
             GROUP BY tool
             ORDER BY {order} {}, tool ASC
             LIMIT ? OFFSET ?",
            w.sql,
            filter.order.sql(),
        );

        let mut stmt = self.conn().prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(w.paged(filter)), |row| {
            Ok(ToolStat {
                tool: row.get(0)?,
                events: row.get(1)?,
                unique_sounds: row.get(2)?,
                avg_fallback_level: row.get(3)?,
            })
        })?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(ClaudioError::from)
    }

    /// Event share per category. Rows with an unknown category code are skipped.
    pub fn category_distribution(&self, filter: &AnalyticsFilter) -> Result<Vec<CategoryCount>> {
        let w = EventWhere::build(filter)?;
        let order = match filter.order_by {
            OrderBy::Count | OrderBy::Recent => "n",
            OrderBy::Name => "code",
        };
        let sql = format!(
            "SELECT json_extract(e.context, '$.category') AS code, COUNT(*) AS n
             FROM hook_events e
             WHERE {}
             GROUP BY code
             ORDER BY {order} {}, code ASC",
            w.sql,
            filter.order.sql(),
        );

        let mut stmt = self.conn().prepare(&sql)?;
        let counts = stmt
            .query_map(params_from_iter(w.params.iter()), |row| {
                Ok((row.get::<_, Option<i64>>(0)?, row.get::<_, i64>(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let total: i64 = counts.iter().map(|(_, n)| n).sum();
        let rows = counts
            .into_iter()
            .filter_map(|(code, count)| {
                let category = code.and_then(EventCategory::from_code);
                if category.is_none() {
                    tracing::debug!("skipping events with category code {code:?}");
                }
                category.map(|category| CategoryCount {
                    category,
                    count,
                    percent: percent(count, total),
                })
            })
            .skip(filter.offset)
            .take(filter.limit.unwrap_or(usize::MAX))
            .collect();
        Ok(rows)
    }

    /// Event share per fallback level, in level order unless sorted by count.
    pub fn fallback_distribution(&self, filter: &AnalyticsFilter) -> Result<Vec<LevelCount>> {
        let w = EventWhere::build(filter)?;
        let order = match filter.order_by {
            OrderBy::Count | OrderBy::Recent => format!("n {}, level ASC", filter.order.sql()),
            OrderBy::Name => format!("level {}", filter.order.sql()),
        };
        let sql = format!(
            "SELECT e.fallback_level AS level, COUNT(*) AS n
             FROM hook_events e
             WHERE {}
             GROUP BY level
             ORDER BY {order}",
            w.sql,
        );

        let mut stmt = self.conn().prepare(&sql)?;
        let counts = stmt
            .query_map(params_from_iter(w.params.iter()), |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let total: i64 = counts.iter().map(|(_, n)| n).sum();
        Ok(counts
            .into_iter()
            .map(|(level, count)| LevelCount {
                level,
                count,
                percent: percent(count, total),
            })
            .skip(filter.offset)
            .take(filter.limit.unwrap_or(usize::MAX))
            .collect())
    }
}
