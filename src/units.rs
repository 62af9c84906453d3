//src/units.rs
use std::collections::HashSet;
use std::fmt;

use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use crate::db::DbError;

pub const KG_TO_LB_MULTIPLIER: f64 = 2.2;

/// Which unit weights and volumes are shown in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitPreference {
    Metric,
    Imperial,
    #[default]
    Unknown,
}

impl UnitPreference {
    /// Normalizes a raw unit tag from the store (settings or equipment).
    pub fn from_tag(tag: Option<&str>) -> Self {
        let Some(tag) = tag else {
            return Self::Unknown;
        };
        let normalized = tag.trim().to_lowercase();
        if normalized.contains("imperial") || normalized == "lb" || normalized == "lbs" {
            Self::Imperial
        } else if normalized.contains("metric") || normalized == "kg" {
            Self::Metric
        } else {
            Self::Unknown
        }
    }

    pub const fn weight_label(self) -> &'static str {
        match self {
            Self::Imperial => "lb",
            Self::Metric | Self::Unknown => "kg",
        }
    }

    /// Collapses a set of equipment tags: any imperial tag wins, then any metric tag.
    fn from_equipment_tags<'a>(tags: impl IntoIterator<Item = &'a str>) -> Self {
        let seen: HashSet<Self> = tags.into_iter().map(|t| Self::from_tag(Some(t))).collect();
        if seen.contains(&Self::Imperial) {
            Self::Imperial
        } else if seen.contains(&Self::Metric) {
            Self::Metric
        } else {
            Self::Unknown
        }
    }
}

impl fmt::Display for UnitPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Metric => write!(f, "metric"),
            Self::Imperial => write!(f, "imperial"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// A weight or volume annotated with the unit it is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct UnitValue {
    pub unit: &'static str,
    pub value: Option<f64>,
}

pub fn weight_unit_label(preference: UnitPreference) -> &'static str {
    preference.weight_label()
}

pub fn with_weight_unit(value: Option<f64>, preference: UnitPreference) -> UnitValue {
    UnitValue {
        unit: preference.weight_label(),
        value,
    }
}

fn round_to_hundredths(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Converts a stored kilogram weight into the display unit.
pub fn to_display_weight(kg: Option<f64>, preference: UnitPreference) -> Option<f64> {
    kg.map(|w| match preference {
        UnitPreference::Imperial => round_to_hundredths(w * KG_TO_LB_MULTIPLIER),
        UnitPreference::Metric | UnitPreference::Unknown => w,
    })
}

/// Converts a stored kg·reps volume into the display unit.
pub fn to_display_volume(kg_reps: Option<f64>, preference: UnitPreference) -> Option<f64> {
    to_display_weight(kg_reps, preference)
}

/// Reads the unit from the global settings record.
pub fn resolve_global_weight_unit(conn: &Connection) -> Result<UnitPreference, DbError> {
    let tag: Option<Option<String>> = conn
        .query_row("SELECT ZMEASURMENTUNIT FROM ZSETTINGS LIMIT 1", [], |row| {
            row.get(0)
        })
        .optional()?;
    Ok(UnitPreference::from_tag(tag.flatten().as_deref()))
}

fn collect_tags(conn: &Connection, sql: &str, id: i64) -> Result<Vec<String>, DbError> {
    let mut stmt = conn.prepare(sql)?;
    let tags = stmt
        .query_map(params![id], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(tags)
}

/// Settings first; otherwise the equipment tags reachable from the program's routines.
pub fn resolve_program_weight_unit(
    conn: &Connection,
    program_id: i64,
) -> Result<UnitPreference, DbError> {
    let global = resolve_global_weight_unit(conn)?;
    if global != UnitPreference::Unknown {
        return Ok(global);
    }

    let tags = collect_tags(
        conn,
        "SELECT eq.ZMEASURMENTUNIT
         FROM ZROUTINE r
         LEFT JOIN ZPERIOD p ON p.Z_PK = r.ZPERIOD
         LEFT JOIN Z_12ROUTINES j ON j.Z_28ROUTINES = r.Z_PK
         LEFT JOIN ZEXERCISECONFIGURATION ec ON ec.Z_PK = j.Z_12EXERCISES
         LEFT JOIN ZEXERCISEINFORMATION ei ON ei.Z_PK = ec.ZINFORMATION
         LEFT JOIN ZEQUIPMENT2 eq ON eq.Z_PK = ei.ZEQUIPMENT
         WHERE (p.ZWORKOUTPLAN = ?1 OR r.ZWORKOUTPLAN = ?1)
           AND r.ZSOFTDELETED IS NOT 1
           AND eq.ZMEASURMENTUNIT IS NOT NULL",
        program_id,
    )?;
    let resolved = UnitPreference::from_equipment_tags(tags.iter().map(String::as_str));
    log::debug!("program {program_id}: unit preference {resolved} from {} equipment tag(s)", tags.len());
    Ok(resolved)
}

/// Settings first; otherwise the exercise's own equipment tag.
pub fn resolve_exercise_weight_unit(
    conn: &Connection,
    exercise_id: i64,
) -> Result<UnitPreference, DbError> {
    let global = resolve_global_weight_unit(conn)?;
    if global != UnitPreference::Unknown {
        return Ok(global);
    }

    let tags = collect_tags(
        conn,
        "SELECT eq.ZMEASURMENTUNIT
         FROM ZEXERCISEINFORMATION ei
         JOIN ZEQUIPMENT2 eq ON eq.Z_PK = ei.ZEQUIPMENT
         WHERE ei.Z_PK = ?1 AND eq.ZMEASURMENTUNIT IS NOT NULL",
        exercise_id,
    )?;
    Ok(UnitPreference::from_equipment_tags(tags.iter().map(String::as_str)))
}
