use chrono::{NaiveDate, Weekday};
use sqlparser::ast::{
    self, Expr, ObjectNamePart, SetExpr, Statement, TableFactor, TableObject, Value, ValueWithSpan,
};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use ulid::Ulid;

use crate::model::*;

/// Parsed command from SQL input.
#[derive(Debug, PartialEq)]
pub enum Command {
    InsertTutor {
        id: Ulid,
        name: String,
        hourly_rate: f64,
        subjects: Vec<String>,
    },
    UpdateTutor {
        id: Ulid,
        hourly_rate: Option<f64>,
        subjects: Option<Vec<String>>,
    },
    InsertParent {
        id: Ulid,
        name: String,
    },
    InsertChild {
        id: Ulid,
        parent_id: Ulid,
        name: String,
        grade: Option<String>,
    },
    /// Wholesale replacement of one weekday's slot list.
    SetAvailability {
        tutor_id: Ulid,
        day: Weekday,
        slots: Vec<SlotTime>,
    },
    SelectTutors,
    SelectAvailability {
        tutor_id: Ulid,
        day: Option<Weekday>,
    },
    SelectOpenSlots {
        tutor_id: Ulid,
        date: NaiveDate,
    },
    InsertBooking {
        request: BookingRequest,
        returning: bool,
    },
    TransitionBooking {
        id: Ulid,
        actor: Actor,
        action: BookingAction,
        returning: bool,
    },
    SelectBookings {
        filter: BookingFilter,
    },
    SelectEarnings {
        tutor_id: Ulid,
    },
    Listen {
        channel: String,
    },
}

pub fn parse_sql(sql: &str) -> Result<Command, SqlError> {
    let trimmed = sql.trim();
    if trimmed.to_uppercase().starts_with("LISTEN ") {
        let channel = trimmed[7..].trim().trim_matches(';').to_string();
        return Ok(Command::Listen { channel });
    }

    let dialect = PostgreSqlDialect {};
    let stmts = Parser::parse_sql(&dialect, sql).map_err(|e| SqlError::Parse(e.to_string()))?;
    if stmts.is_empty() {
        return Err(SqlError::Empty);
    }

    match &stmts[0] {
        Statement::Insert(insert) => parse_insert(insert),
        Statement::Update {
            table,
            assignments,
            selection,
            returning,
            ..
        } => parse_update(table, assignments, selection, returning.is_some()),
        Statement::Query(query) => parse_select(query),
        other => Err(SqlError::Unsupported(format!("{other}"))),
    }
}

fn parse_insert(insert: &ast::Insert) -> Result<Command, SqlError> {
    let table = insert_table_name(insert)?;
    let values = extract_insert_values(insert)?;

    match table.as_str() {
        "tutors" => {
            if values.len() < 3 {
                return Err(SqlError::WrongArity("tutors", 3, values.len()));
            }
            let subjects = if values.len() >= 4 {
                parse_subjects(&values[3])?
            } else {
                Vec::new()
            };
            Ok(Command::InsertTutor {
                id: parse_ulid(&values[0])?,
                name: parse_string(&values[1])?,
                hourly_rate: parse_f64(&values[2])?,
                subjects,
            })
        }
        "parents" => {
            if values.len() < 2 {
                return Err(SqlError::WrongArity("parents", 2, values.len()));
            }
            Ok(Command::InsertParent {
                id: parse_ulid(&values[0])?,
                name: parse_string(&values[1])?,
            })
        }
        "children" => {
            if values.len() < 3 {
                return Err(SqlError::WrongArity("children", 3, values.len()));
            }
            let grade = if values.len() >= 4 {
                parse_string_or_null(&values[3])?
            } else {
                None
            };
            Ok(Command::InsertChild {
                id: parse_ulid(&values[0])?,
                parent_id: parse_ulid(&values[1])?,
                name: parse_string(&values[2])?,
                grade,
            })
        }
        "availability" => {
            if values.len() < 3 {
                return Err(SqlError::WrongArity("availability", 3, values.len()));
            }
            Ok(Command::SetAvailability {
                tutor_id: parse_ulid(&values[0])?,
                day: parse_weekday_expr(&values[1])?,
                slots: parse_slots(&values[2])?,
            })
        }
        "bookings" => {
            // (tutor_id, parent_id, child_id, subject, date, time, duration[, notes])
            // The booking id is assigned by the engine; RETURNING * yields it.
            if values.len() < 7 {
                return Err(SqlError::WrongArity("bookings", 7, values.len()));
            }
            let notes = if values.len() >= 8 {
                parse_string_or_null(&values[7])?
            } else {
                None
            };
            let request = BookingRequest {
                tutor_id: parse_ulid(&values[0])?,
                parent_id: parse_ulid(&values[1])?,
                child_id: parse_ulid(&values[2])?,
                subject: parse_string(&values[3])?,
                date: parse_date(&values[4])?,
                time: parse_time(&values[5])?,
                duration_minutes: parse_u32(&values[6])?,
                notes,
            };
            Ok(Command::InsertBooking {
                request,
                returning: insert.returning.is_some(),
            })
        }
        _ => Err(SqlError::UnknownTable(table)),
    }
}

fn parse_update(
    table: &ast::TableWithJoins,
    assignments: &[ast::Assignment],
    selection: &Option<Expr>,
    returning: bool,
) -> Result<Command, SqlError> {
    let table = table_factor_name(&table.relation)?;

    match table.as_str() {
        "tutors" => {
            let mut hourly_rate = None;
            let mut subjects = None;
            for assignment in assignments {
                match assignment_column(assignment)?.as_str() {
                    "hourly_rate" => hourly_rate = Some(parse_f64(&assignment.value)?),
                    "subjects" => subjects = Some(parse_subjects(&assignment.value)?),
                    other => {
                        return Err(SqlError::Parse(format!(
                            "unknown column in UPDATE tutors: {other}"
                        )));
                    }
                }
            }
            let id = extract_where_id(selection)?;
            Ok(Command::UpdateTutor { id, hourly_rate, subjects })
        }
        "bookings" => {
            let mut action = None;
            for assignment in assignments {
                match assignment_column(assignment)?.as_str() {
                    "action" => action = Some(parse_action(&assignment.value)?),
                    other => {
                        return Err(SqlError::Parse(format!(
                            "unknown column in UPDATE bookings: {other}"
                        )));
                    }
                }
            }
            let filters = collect_eq_filters(selection)?;
            let mut id = None;
            let mut actor = None;
            for (col, expr) in &filters {
                match col.as_str() {
                    "id" => id = Some(parse_ulid(expr)?),
                    "actor" => actor = Some(parse_actor(expr)?),
                    _ => {}
                }
            }
            Ok(Command::TransitionBooking {
                id: id.ok_or(SqlError::MissingFilter("id"))?,
                actor: actor.ok_or(SqlError::MissingFilter("actor"))?,
                action: action.ok_or(SqlError::MissingFilter("action"))?,
                returning,
            })
        }
        _ => Err(SqlError::UnknownTable(table)),
    }
}

fn parse_select(query: &ast::Query) -> Result<Command, SqlError> {
    let select = match query.body.as_ref() {
        SetExpr::Select(s) => s,
        _ => return Err(SqlError::Unsupported("non-SELECT query".into())),
    };

    if select.from.is_empty() {
        return Err(SqlError::Parse("SELECT without FROM".into()));
    }
    let table = table_factor_name(&select.from[0].relation)?;
    let filters = collect_eq_filters(&select.selection)?;

    match table.as_str() {
        "tutors" => Ok(Command::SelectTutors),
        "availability" => {
            let mut tutor_id = None;
            let mut day = None;
            for (col, expr) in &filters {
                match col.as_str() {
                    "tutor_id" => tutor_id = Some(parse_ulid(expr)?),
                    "day" => day = Some(parse_weekday_expr(expr)?),
                    _ => {}
                }
            }
            Ok(Command::SelectAvailability {
                tutor_id: tutor_id.ok_or(SqlError::MissingFilter("tutor_id"))?,
                day,
            })
        }
        "open_slots" => {
            let mut tutor_id = None;
            let mut date = None;
            for (col, expr) in &filters {
                match col.as_str() {
                    "tutor_id" => tutor_id = Some(parse_ulid(expr)?),
                    "date" => date = Some(parse_date(expr)?),
                    _ => {}
                }
            }
            Ok(Command::SelectOpenSlots {
                tutor_id: tutor_id.ok_or(SqlError::MissingFilter("tutor_id"))?,
                date: date.ok_or(SqlError::MissingFilter("date"))?,
            })
        }
        "bookings" => {
            let mut filter = BookingFilter::default();
            for (col, expr) in &filters {
                match col.as_str() {
                    "tutor_id" => filter.tutor = Some(parse_ulid(expr)?),
                    "parent_id" => filter.parent = Some(parse_ulid(expr)?),
                    "status" => filter.status = Some(parse_status(expr)?),
                    _ => {}
                }
            }
            Ok(Command::SelectBookings { filter })
        }
        "earnings" => {
            let mut tutor_id = None;
            for (col, expr) in &filters {
                if col == "tutor_id" {
                    tutor_id = Some(parse_ulid(expr)?);
                }
            }
            Ok(Command::SelectEarnings {
                tutor_id: tutor_id.ok_or(SqlError::MissingFilter("tutor_id"))?,
            })
        }
        _ => Err(SqlError::UnknownTable(table)),
    }
}

// ── Helpers ───────────────────────────────────────────────────

fn object_name_last(name: &ast::ObjectName) -> Option<String> {
    name.0.last().and_then(|part| match part {
        ObjectNamePart::Identifier(ident) => Some(ident.value.to_lowercase()),
        _ => None,
    })
}

fn insert_table_name(insert: &ast::Insert) -> Result<String, SqlError> {
    match &insert.table {
        TableObject::TableName(name) => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty table name".into()))
        }
        _ => Err(SqlError::Parse("unsupported table object in INSERT".into())),
    }
}

fn table_factor_name(tf: &TableFactor) -> Result<String, SqlError> {
    match tf {
        TableFactor::Table { name, .. } => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty table name".into()))
        }
        _ => Err(SqlError::Parse("complex table expression".into())),
    }
}

fn assignment_column(assignment: &ast::Assignment) -> Result<String, SqlError> {
    match &assignment.target {
        ast::AssignmentTarget::ColumnName(name) => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty column name".into()))
        }
        _ => Err(SqlError::Parse("unsupported assignment target".into())),
    }
}

fn extract_insert_values(insert: &ast::Insert) -> Result<Vec<Expr>, SqlError> {
    let body = insert
        .source
        .as_ref()
        .ok_or(SqlError::Parse("no VALUES".into()))?;
    match body.body.as_ref() {
        SetExpr::Values(values) => {
            if values.rows.is_empty() {
                return Err(SqlError::Parse("empty VALUES".into()));
            }
            if values.rows.len() > 1 {
                return Err(SqlError::Unsupported("multi-row INSERT".into()));
            }
            Ok(values.rows[0].clone())
        }
        _ => Err(SqlError::Parse("expected VALUES".into())),
    }
}

/// Walk an AND-combined WHERE clause collecting `column = value` pairs.
/// Non-equality operators are ignored, matching the lenient filter style of
/// the rest of the dialect.
fn collect_eq_filters(selection: &Option<Expr>) -> Result<Vec<(String, Expr)>, SqlError> {
    fn walk(expr: &Expr, out: &mut Vec<(String, Expr)>) {
        if let Expr::BinaryOp { left, op, right } = expr {
            match op {
                ast::BinaryOperator::And => {
                    walk(left, out);
                    walk(right, out);
                }
                ast::BinaryOperator::Eq => {
                    if let Some(col) = expr_column_name(left) {
                        out.push((col, (**right).clone()));
                    }
                }
                _ => {}
            }
        }
    }

    let mut out = Vec::new();
    if let Some(sel) = selection {
        walk(sel, &mut out);
    }
    Ok(out)
}

fn extract_where_id(selection: &Option<Expr>) -> Result<Ulid, SqlError> {
    let filters = collect_eq_filters(selection)?;
    for (col, expr) in &filters {
        if col == "id" {
            return parse_ulid(expr);
        }
    }
    Err(SqlError::MissingFilter("id"))
}

fn expr_column_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Identifier(ident) => Some(ident.value.to_lowercase()),
        Expr::CompoundIdentifier(parts) => parts.last().map(|i| i.value.to_lowercase()),
        _ => None,
    }
}

fn extract_value(expr: &Expr) -> Option<&Value> {
    match expr {
        Expr::Value(ValueWithSpan { value, .. }) => Some(value),
        _ => None,
    }
}

fn parse_ulid(expr: &Expr) -> Result<Ulid, SqlError> {
    if let Some(value) = extract_value(expr) {
        match value {
            Value::SingleQuotedString(s) | Value::Number(s, _) => {
                Ulid::from_string(s).map_err(|e| SqlError::Parse(format!("bad ULID: {e}")))
            }
            _ => Err(SqlError::Parse(format!("expected string, got {value:?}"))),
        }
    } else {
        Err(SqlError::Parse(format!("expected value, got {expr:?}")))
    }
}

fn parse_string(expr: &Expr) -> Result<String, SqlError> {
    if let Some(value) = extract_value(expr) {
        match value {
            Value::SingleQuotedString(s) => Ok(s.clone()),
            _ => Err(SqlError::Parse(format!("expected string, got {value:?}"))),
        }
    } else {
        Err(SqlError::Parse(format!("expected value, got {expr:?}")))
    }
}

fn parse_string_or_null(expr: &Expr) -> Result<Option<String>, SqlError> {
    if let Some(value) = extract_value(expr) {
        match value {
            Value::Null => Ok(None),
            Value::SingleQuotedString(s) => Ok(Some(s.clone())),
            _ => Err(SqlError::Parse(format!(
                "expected string or NULL, got {value:?}"
            ))),
        }
    } else {
        Err(SqlError::Parse(format!("expected value, got {expr:?}")))
    }
}

fn parse_f64(expr: &Expr) -> Result<f64, SqlError> {
    if let Some(value) = extract_value(expr) {
        match value {
            Value::Number(s, _) | Value::SingleQuotedString(s) => s
                .parse()
                .map_err(|e| SqlError::Parse(format!("bad number: {e}"))),
            _ => Err(SqlError::Parse(format!("expected number, got {value:?}"))),
        }
    } else {
        Err(SqlError::Parse(format!("expected value, got {expr:?}")))
    }
}

fn parse_u32(expr: &Expr) -> Result<u32, SqlError> {
    if let Some(value) = extract_value(expr) {
        match value {
            Value::Number(s, _) | Value::SingleQuotedString(s) => s
                .parse()
                .map_err(|e| SqlError::Parse(format!("bad integer: {e}"))),
            _ => Err(SqlError::Parse(format!("expected integer, got {value:?}"))),
        }
    } else {
        Err(SqlError::Parse(format!("expected value, got {expr:?}")))
    }
}

fn parse_date(expr: &Expr) -> Result<NaiveDate, SqlError> {
    let s = parse_string(expr)?;
    NaiveDate::parse_from_str(&s, "%Y-%m-%d")
        .map_err(|e| SqlError::Parse(format!("bad date {s:?}: {e}")))
}

fn parse_time(expr: &Expr) -> Result<SlotTime, SqlError> {
    let s = parse_string(expr)?;
    s.parse().map_err(|e| SqlError::Parse(format!("{e}")))
}

fn parse_weekday_expr(expr: &Expr) -> Result<Weekday, SqlError> {
    let s = parse_string(expr)?;
    parse_weekday(&s).ok_or_else(|| SqlError::Parse(format!("bad weekday: {s}")))
}

fn parse_actor(expr: &Expr) -> Result<Actor, SqlError> {
    let s = parse_string(expr)?;
    Actor::parse(&s).ok_or_else(|| SqlError::Parse(format!("bad actor: {s}")))
}

fn parse_action(expr: &Expr) -> Result<BookingAction, SqlError> {
    let s = parse_string(expr)?;
    BookingAction::parse(&s).ok_or_else(|| SqlError::Parse(format!("bad action: {s}")))
}

fn parse_status(expr: &Expr) -> Result<BookingStatus, SqlError> {
    let s = parse_string(expr)?;
    BookingStatus::parse(&s).ok_or_else(|| SqlError::Parse(format!("bad status: {s}")))
}

/// Comma-separated subject list: `'Math,English'`. Empty string means none.
fn parse_subjects(expr: &Expr) -> Result<Vec<String>, SqlError> {
    let s = parse_string(expr)?;
    Ok(s.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(String::from)
        .collect())
}

/// Comma-separated slot list: `'09:00,10:00'`. Empty string clears the day.
fn parse_slots(expr: &Expr) -> Result<Vec<SlotTime>, SqlError> {
    let s = parse_string(expr)?;
    s.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse()
                .map_err(|e| SqlError::Parse(format!("{e}")))
        })
        .collect()
}

// ── Errors ────────────────────────────────────────────────────

#[derive(Debug)]
pub enum SqlError {
    Parse(String),
    Empty,
    Unsupported(String),
    UnknownTable(String),
    WrongArity(&'static str, usize, usize),
    MissingFilter(&'static str),
}

impl std::fmt::Display for SqlError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SqlError::Parse(s) => write!(f, "parse error: {s}"),
            SqlError::Empty => write!(f, "empty query"),
            SqlError::Unsupported(s) => write!(f, "unsupported: {s}"),
            SqlError::UnknownTable(t) => write!(f, "unknown table: {t}"),
            SqlError::WrongArity(t, expected, got) => {
                write!(f, "{t}: expected {expected} values, got {got}")
            }
            SqlError::MissingFilter(col) => write!(f, "missing filter: {col}"),
        }
    }
}

impl std::error::Error for SqlError {}
