use super::schema::{DataType, Transform};
use super::table::Cell;
use tracing::warn;

/// Applies one transform. Text operations leave non-text cells alone.
pub fn apply(cell: Cell, transform: &Transform) -> Cell {
    match transform {
        Transform::Lower => map_text(cell, |text| text.to_lowercase()),
        Transform::Upper => map_text(cell, |text| text.to_uppercase()),
        Transform::Strip => map_text(cell, |text| text.trim().to_string()),
        Transform::Unidecode => map_text(cell, deunicode::deunicode),
        Transform::Cast(dtype) => coerce(cell, dtype),
        Transform::Unknown(_) => cell,
    }
}

pub fn apply_all(cell: Cell, transforms: &[Transform]) -> Cell {
    transforms
        .iter()
        .fold(cell, |cell, transform| apply(cell, transform))
}

/// Logs each unknown op once per column instead of once per cell.
pub(crate) fn warn_unknown(column: &str, transforms: &[Transform]) {
    for transform in transforms {
        if let Transform::Unknown(op) = transform {
            warn!(column, op = %op, "ignoring unknown transform");
        }
    }
}

/// Converts a cell to `dtype`. Values that do not convert become missing;
/// unrecognized types leave the cell as it is.
pub fn coerce(cell: Cell, dtype: &DataType) -> Cell {
    if cell.is_missing() {
        return cell;
    }
    match dtype {
        DataType::String => match cell {
            Cell::Text(_) => cell,
            other => Cell::Text(other.to_string()),
        },
        DataType::Int => match cell {
            Cell::Int(_) => cell,
            Cell::Float(value) => float_to_int(value),
            Cell::Bool(value) => Cell::Int(i64::from(value)),
            Cell::Text(text) => parse_int(&text),
            Cell::Missing => Cell::Missing,
        },
        DataType::Float => match cell {
            Cell::Float(_) => cell,
            Cell::Int(value) => Cell::Float(value as f64),
            Cell::Bool(value) => Cell::Float(if value { 1.0 } else { 0.0 }),
            Cell::Text(text) => parse_float(&text).map_or(Cell::Missing, Cell::Float),
            Cell::Missing => Cell::Missing,
        },
        DataType::Bool => match cell {
            Cell::Bool(_) => cell,
            Cell::Int(1) => Cell::Bool(true),
            Cell::Int(0) => Cell::Bool(false),
            Cell::Text(text) => parse_bool(&text).map_or(Cell::Missing, Cell::Bool),
            _ => Cell::Missing,
        },
        DataType::Other(_) => cell,
    }
}

fn map_text<F>(cell: Cell, f: F) -> Cell
where
    F: Fn(&str) -> String,
{
    match cell {
        Cell::Text(text) => Cell::Text(f(&text)),
        other => other,
    }
}

fn parse_int(text: &str) -> Cell {
    let trimmed = text.trim();
    if let Ok(value) = trimmed.parse::<i64>() {
        return Cell::Int(value);
    }
    parse_float(trimmed).map_or(Cell::Missing, float_to_int)
}

fn float_to_int(value: f64) -> Cell {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        Cell::Int(value as i64)
    } else {
        Cell::Missing
    }
}

fn parse_float(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|value| !value.is_nan())
}

fn parse_bool(text: &str) -> Option<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}
