//! Translation of `ContactQuery` filters into SQL over `contacts c`.
//!
//! Every user supplied value is bound as a parameter. Placeholders are
//! positional, so conditions push their parameters in the order their
//! placeholders appear in the generated text.

use super::sqlite_contact_store::{row_to_contact, visible_fields_for, CONTACT_COLUMNS};
use super::sqlite_journal_store::visible_journal_condition;
use super::sqlite_user_store::allowed_projects_condition;
use super::{now_seconds, placeholders, SqliteContactStore};
use crate::contact::query::{parse_id_list, Filter, FilterField, Operator};
use crate::contact::{
    Contact, ContactQuery, ContactQueryStore, CustomField, FieldFormat, QueryColumn,
    SortDirection,
};
use crate::error::{ContactsError, ContactsResult};
use crate::user::{Permission, User};
use chrono::{DateTime, Datelike, Duration, NaiveDate};
use rusqlite::{Connection, ToSql};
use tracing::debug;

type Params = Vec<Box<dyn ToSql>>;

struct QueryStatement {
    where_sql: String,
    order_sql: String,
    params: Params,
}

/// How a date filter compares: unix seconds or `YYYY-MM-DD` text.
#[derive(Clone, Copy)]
enum DateColumn<'a> {
    Timestamp(&'a str),
    IsoText(&'a str),
}

impl DateColumn<'_> {
    fn column(&self) -> &str {
        match self {
            DateColumn::Timestamp(c) | DateColumn::IsoText(c) => c,
        }
    }

    fn bound(&self, date: NaiveDate) -> Box<dyn ToSql> {
        match self {
            DateColumn::Timestamp(_) => Box::new(day_start(date)),
            DateColumn::IsoText(_) => Box::new(date.format("%Y-%m-%d").to_string()),
        }
    }
}

fn day_start(date: NaiveDate) -> i64 {
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp())
        .unwrap_or_default()
}

fn parse_date(value: &str) -> ContactsResult<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| ContactsError::InvalidQuery(vec![format!("Invalid date {}", value)]))
}

fn parse_days(value: &str) -> ContactsResult<i64> {
    value
        .parse()
        .map_err(|_| ContactsError::InvalidQuery(vec![format!("Invalid number of days {}", value)]))
}

fn days_before(today: NaiveDate, days: i64) -> ContactsResult<NaiveDate> {
    Duration::try_days(days)
        .and_then(|delta| today.checked_sub_signed(delta))
        .ok_or_else(|| ContactsError::InvalidQuery(vec![format!("{} days ago is out of range", days)]))
}

fn next_day(date: NaiveDate) -> ContactsResult<NaiveDate> {
    date.succ_opt()
        .ok_or_else(|| ContactsError::InvalidQuery(vec![format!("Date {} is out of range", date)]))
}

/// `%`, `_` and `\` are literal in LIKE patterns built from user input.
fn like_escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

const SEARCH_COLUMNS: [&str; 5] = [
    "c.first_name",
    "c.last_name",
    "c.company",
    "c.email",
    "c.phone",
];

/// Every token must match at least one searchable column. A search with no
/// usable token matches nothing.
fn search_condition(tokens: &[String], params: &mut Params) -> String {
    if tokens.is_empty() {
        return "1 = 0".to_string();
    }
    tokens
        .iter()
        .map(|token| {
            let pattern = format!("%{}%", like_escape(token));
            let columns: Vec<String> = SEARCH_COLUMNS
                .iter()
                .map(|column| {
                    params.push(Box::new(pattern.clone()));
                    format!("{} LIKE ? ESCAPE '\\'", column)
                })
                .collect();
            format!("({})", columns.join(" OR "))
        })
        .collect::<Vec<_>>()
        .join(" AND ")
}

fn in_list(column: &str, values: &[String], params: &mut Params) -> String {
    for value in values {
        params.push(Box::new(value.clone()));
    }
    format!("{} IN ({})", column, placeholders(values.len()))
}

fn in_id_list(column: &str, ids: &[i64], params: &mut Params) -> String {
    for id in ids {
        params.push(Box::new(*id));
    }
    format!("{} IN ({})", column, placeholders(ids.len()))
}

/// Text comparisons, negated operators included.
fn text_condition(column: &str, operator: Operator, values: &[String], params: &mut Params) -> String {
    let like = |pattern: String, params: &mut Params| {
        params.push(Box::new(pattern));
        format!("{} LIKE ? ESCAPE '\\'", column)
    };
    let first = values.first().map(|v| like_escape(v)).unwrap_or_default();
    match operator {
        Operator::Contains => like(format!("%{}%", first), params),
        Operator::NotContains => {
            params.push(Box::new(format!("%{}%", first)));
            format!("COALESCE({}, '') NOT LIKE ? ESCAPE '\\'", column)
        }
        Operator::StartsWith => like(format!("{}%", first), params),
        Operator::EndsWith => like(format!("%{}", first), params),
        Operator::Equals => in_list(column, values, params),
        Operator::NotEquals => format!(
            "({} IS NULL OR NOT {})",
            column,
            in_list(column, values, params)
        ),
        Operator::Any => format!("({} IS NOT NULL AND {} <> '')", column, column),
        _ => format!("({} IS NULL OR {} = '')", column, column),
    }
}

/// Positive form of a negated operator, for filters over related rows where
/// negation means "no related row matches".
fn positive(operator: Operator) -> (Operator, bool) {
    match operator {
        Operator::NotContains => (Operator::Contains, true),
        Operator::NotEquals => (Operator::Equals, true),
        Operator::None => (Operator::Any, true),
        other => (other, false),
    }
}

fn exists(negated: bool, subquery: String) -> String {
    format!("{}EXISTS ({})", if negated { "NOT " } else { "" }, subquery)
}

fn date_condition(
    column: DateColumn,
    operator: Operator,
    values: &[String],
    today: NaiveDate,
    params: &mut Params,
) -> ContactsResult<String> {
    let col = column.column();
    let range = |from: Option<NaiveDate>, to: Option<NaiveDate>, params: &mut Params| {
        let mut parts = Vec::new();
        if let Some(from) = from {
            params.push(column.bound(from));
            parts.push(format!("{} >= ?", col));
        }
        if let Some(to) = to {
            params.push(column.bound(to));
            parts.push(format!("{} < ?", col));
        }
        format!("({})", parts.join(" AND "))
    };

    Ok(match operator {
        Operator::Equals => {
            let date = parse_date(&values[0])?;
            range(Some(date), Some(next_day(date)?), params)
        }
        Operator::GreaterOrEqual => range(Some(parse_date(&values[0])?), None, params),
        Operator::LessOrEqual => range(None, Some(next_day(parse_date(&values[0])?)?), params),
        Operator::Between => {
            let from = parse_date(&values[0])?;
            let to = parse_date(&values[1])?;
            range(Some(from), Some(next_day(to)?), params)
        }
        Operator::MoreThanDaysAgo => {
            let days = parse_days(&values[0])?;
            range(None, Some(next_day(days_before(today, days)?)?), params)
        }
        Operator::LessThanDaysAgo => {
            let days = parse_days(&values[0])?;
            range(Some(days_before(today, days)?), Some(next_day(today)?), params)
        }
        Operator::Today => range(Some(today), Some(next_day(today)?), params),
        Operator::Yesterday => range(Some(today - Duration::days(1)), Some(today), params),
        Operator::ThisWeek => {
            let monday = today - Duration::days(today.weekday().num_days_from_monday() as i64);
            range(Some(monday), Some(monday + Duration::days(7)), params)
        }
        Operator::Any => format!("{} IS NOT NULL", col),
        Operator::None => format!("{} IS NULL", col),
        other => {
            return Err(ContactsError::InvalidQuery(vec![format!(
                "Operator {} is not valid for dates",
                other.as_str()
            )]))
        }
    })
}

fn user_ids(values: &[String], viewer: &User) -> Vec<i64> {
    values
        .iter()
        .filter_map(|v| {
            if v == "me" {
                Some(viewer.id)
            } else {
                v.parse().ok()
            }
        })
        .collect()
}

fn list_condition(column: &str, operator: Operator, ids: &[i64], params: &mut Params) -> String {
    match operator {
        Operator::Equals => in_id_list(column, ids, params),
        Operator::NotEquals => format!("({} IS NULL OR NOT {})", column, in_id_list(column, ids, params)),
        Operator::Any => format!("{} IS NOT NULL", column),
        _ => format!("{} IS NULL", column),
    }
}

fn filter_condition(
    filter: &Filter,
    viewer: &User,
    custom_fields: &[CustomField],
    today: NaiveDate,
    params: &mut Params,
) -> ContactsResult<String> {
    let values = &filter.values;
    let operator = filter.operator;
    Ok(match filter.field {
        FilterField::ProjectId => {
            let ids: Vec<i64> = values.iter().filter_map(|v| v.parse().ok()).collect();
            list_condition("c.project_id", operator, &ids, params)
        }
        FilterField::AuthorId => list_condition("c.author_id", operator, &user_ids(values, viewer), params),
        FilterField::FirstName => text_condition("c.first_name", operator, values, params),
        FilterField::LastName => text_condition("c.last_name", operator, values, params),
        FilterField::Phone => text_condition("c.phone", operator, values, params),
        FilterField::Email => text_condition("c.email", operator, values, params),
        FilterField::CreatedOn => {
            date_condition(DateColumn::Timestamp("c.created_on"), operator, values, today, params)?
        }
        FilterField::UpdatedOn => match operator {
            Operator::Any => "c.updated_on > c.created_on".to_string(),
            Operator::None => "c.updated_on = c.created_on".to_string(),
            _ => date_condition(DateColumn::Timestamp("c.updated_on"), operator, values, today, params)?,
        },
        FilterField::ContactId => {
            let ids: Vec<i64> = values
                .iter()
                .flat_map(|v| parse_id_list(v).unwrap_or_default())
                .collect();
            list_condition("c.id", operator, &ids, params)
        }
        FilterField::Attachment => {
            let (operator, negated) = positive(operator);
            let inner = match operator {
                Operator::Any => "1 = 1".to_string(),
                _ => text_condition("a.filename", operator, values, params),
            };
            exists(
                negated,
                format!(
                    "SELECT 1 FROM attachments a WHERE a.contact_id = c.id AND {}",
                    inner
                ),
            )
        }
        FilterField::UpdatedBy => {
            let (operator, negated) = positive(operator);
            let visible = visible_journal_condition(viewer, params);
            let authors = match operator {
                Operator::Any => "1 = 1".to_string(),
                _ => in_id_list("j.user_id", &user_ids(values, viewer), params),
            };
            exists(
                negated,
                format!(
                    "SELECT 1 FROM journals j WHERE j.contact_id = c.id AND {} AND {}",
                    visible, authors
                ),
            )
        }
        FilterField::LastUpdatedBy => {
            let visible = visible_journal_condition(viewer, params);
            let last_author = format!(
                "(SELECT j.user_id FROM journals j WHERE j.contact_id = c.id AND {} \
                 ORDER BY j.id DESC LIMIT 1)",
                visible
            );
            match operator {
                Operator::Equals => in_id_list(&last_author, &user_ids(values, viewer), params),
                Operator::NotEquals => {
                    let ids = user_ids(values, viewer);
                    for id in &ids {
                        params.push(Box::new(*id));
                    }
                    format!(
                        "COALESCE({}, 0) NOT IN ({})",
                        last_author,
                        placeholders(ids.len())
                    )
                }
                Operator::Any => format!("{} IS NOT NULL", last_author),
                _ => format!("{} IS NULL", last_author),
            }
        }
        FilterField::ProjectStatus => {
            let statuses: Vec<i64> = values.iter().filter_map(|v| v.parse().ok()).collect();
            match operator {
                Operator::Any => "1 = 1".to_string(),
                Operator::None => "1 = 0".to_string(),
                _ => {
                    let negated = operator == Operator::NotEquals;
                    format!(
                        "c.project_id {}IN (SELECT id FROM projects WHERE {})",
                        if negated { "NOT " } else { "" },
                        in_id_list("status", &statuses, params)
                    )
                }
            }
        }
        FilterField::CustomField(field_id) => {
            let field = custom_fields
                .iter()
                .find(|f| f.id == field_id)
                .ok_or_else(|| ContactsError::InvalidQuery(vec![format!("Unknown filter cf_{}", field_id)]))?;
            let (positive_op, negated) = match field.format {
                FieldFormat::Date => (operator, false),
                _ => positive(operator),
            };
            params.push(Box::new(field_id));
            let inner = match (field.format, positive_op) {
                (_, Operator::Any) => "cv.value <> ''".to_string(),
                (FieldFormat::Date, Operator::None) => {
                    return Ok("NOT EXISTS (SELECT 1 FROM custom_values cv WHERE cv.contact_id = c.id \
                         AND cv.custom_field_id = ? AND cv.value <> '')"
                        .to_string())
                }
                (FieldFormat::Date, op) => {
                    date_condition(DateColumn::IsoText("cv.value"), op, values, today, params)?
                }
                (FieldFormat::List | FieldFormat::Bool, _) => in_list("cv.value", values, params),
                (_, op) => text_condition("cv.value", op, values, params),
            };
            exists(
                negated,
                format!(
                    "SELECT 1 FROM custom_values cv WHERE cv.contact_id = c.id \
                     AND cv.custom_field_id = ? AND {}",
                    inner
                ),
            )
        }
    })
}

fn order_expression(column: &QueryColumn) -> String {
    match column {
        QueryColumn::Id => "c.id".to_string(),
        QueryColumn::FirstName => "c.first_name".to_string(),
        QueryColumn::LastName => "c.last_name".to_string(),
        QueryColumn::Company => "c.company".to_string(),
        QueryColumn::Phone => "c.phone".to_string(),
        QueryColumn::Email => "c.email".to_string(),
        QueryColumn::CreatedOn => "c.created_on".to_string(),
        QueryColumn::UpdatedOn => "c.updated_on".to_string(),
        QueryColumn::LastUpdatedBy => "c.id".to_string(),
        QueryColumn::CustomField(id) => format!(
            "(SELECT MIN(cv.value) FROM custom_values cv \
             WHERE cv.contact_id = c.id AND cv.custom_field_id = {})",
            id
        ),
    }
}

fn build_statement(
    conn: &Connection,
    query: &ContactQuery,
    viewer: &User,
    today: NaiveDate,
) -> ContactsResult<QueryStatement> {
    let custom_fields = visible_fields_for(conn, viewer, query.project_id)?;
    query
        .validate(&custom_fields)
        .map_err(ContactsError::InvalidQuery)?;

    let mut params: Params = vec![];
    let mut conditions = vec![allowed_projects_condition(
        "c.project_id",
        viewer,
        Permission::ViewContacts,
        &mut params,
    )];
    if let Some(project_id) = query.project_id {
        params.push(Box::new(project_id));
        conditions.push("c.project_id = ?".to_string());
    }
    for filter in &query.filters {
        conditions.push(filter_condition(
            filter,
            viewer,
            &custom_fields,
            today,
            &mut params,
        )?);
    }
    if query.search.is_some() {
        conditions.push(search_condition(&query.search_tokens(), &mut params));
    }

    let mut order: Vec<String> = Vec::new();
    if let Some(group) = &query.group_by {
        order.push(format!("{} ASC", order_expression(group)));
    }
    for (column, direction) in &query.sort {
        order.push(format!("{} {}", order_expression(column), direction.as_sql()));
    }
    order.push(format!("c.id {}", SortDirection::Desc.as_sql()));

    Ok(QueryStatement {
        where_sql: conditions.join(" AND "),
        order_sql: order.join(", "),
        params,
    })
}

fn today() -> NaiveDate {
    DateTime::from_timestamp(now_seconds(), 0)
        .map(|dt| dt.date_naive())
        .unwrap_or_default()
}

impl SqliteContactStore {
    fn run_contact_query<T>(
        &self,
        query: &ContactQuery,
        viewer: &User,
        select: &str,
        suffix: &str,
        suffix_params: Params,
        map_row: impl FnMut(&rusqlite::Row) -> rusqlite::Result<T>,
    ) -> ContactsResult<Vec<T>> {
        let conn = self.conn.lock().unwrap();
        let mut statement = build_statement(&conn, query, viewer, today())?;
        statement.params.extend(suffix_params);
        let sql = format!(
            "SELECT {} FROM contacts c WHERE {} {}",
            select,
            statement.where_sql,
            suffix.replace("{order}", &statement.order_sql)
        );
        debug!("Contact query: {}", sql);
        let param_refs: Vec<&dyn ToSql> = statement.params.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(param_refs.as_slice(), map_row)?
            .collect::<rusqlite::Result<Vec<T>>>()?;
        Ok(rows)
    }
}

impl ContactQueryStore for SqliteContactStore {
    fn count_contacts(&self, query: &ContactQuery, viewer: &User) -> ContactsResult<usize> {
        let counts = self.run_contact_query(query, viewer, "COUNT(*)", "", vec![], |row| {
            row.get::<_, i64>(0)
        })?;
        Ok(counts.first().copied().unwrap_or_default() as usize)
    }

    fn query_contacts(
        &self,
        query: &ContactQuery,
        viewer: &User,
        limit: usize,
        offset: usize,
    ) -> ContactsResult<Vec<Contact>> {
        self.run_contact_query(
            query,
            viewer,
            CONTACT_COLUMNS,
            "ORDER BY {order} LIMIT ? OFFSET ?",
            vec![Box::new(limit as i64), Box::new(offset as i64)],
            row_to_contact,
        )
    }

    fn query_contact_ids(&self, query: &ContactQuery, viewer: &User) -> ContactsResult<Vec<i64>> {
        self.run_contact_query(query, viewer, "c.id", "ORDER BY {order}", vec![], |row| {
            row.get::<_, i64>(0)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_patterns_escape_wildcards() {
        assert_eq!(like_escape("50%_off\\"), "50\\%\\_off\\\\");
    }

    #[test]
    fn date_ranges_are_half_open_days() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 14).unwrap();
        let mut params: Params = vec![];
        let sql = date_condition(
            DateColumn::Timestamp("c.created_on"),
            Operator::Equals,
            &["2024-03-01".to_string()],
            today,
            &mut params,
        )
        .unwrap();
        assert_eq!(sql, "(c.created_on >= ? AND c.created_on < ?)");
        assert_eq!(params.len(), 2);

        let mut params: Params = vec![];
        let sql = date_condition(
            DateColumn::IsoText("cv.value"),
            Operator::MoreThanDaysAgo,
            &["3".to_string()],
            today,
            &mut params,
        )
        .unwrap();
        assert_eq!(sql, "(cv.value < ?)");
    }

    #[test]
    fn days_ago_outside_calendar_is_rejected() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 14).unwrap();
        assert!(days_before(today, 4_000_000_000).is_err());
        assert!(days_before(today, i64::MAX).is_err());
        assert_eq!(
            days_before(today, 14).unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()
        );
        assert!(next_day(NaiveDate::MAX).is_err());
    }

    #[test]
    fn search_ands_tokens_and_ors_columns() {
        let mut params: Params = vec![];
        let sql = search_condition(&["ada".to_string(), "50%".to_string()], &mut params);
        assert_eq!(params.len(), 2 * SEARCH_COLUMNS.len());
        assert_eq!(sql.matches(" OR ").count(), 2 * (SEARCH_COLUMNS.len() - 1));
        assert_eq!(sql.matches(") AND (").count(), 1);

        let mut params: Params = vec![];
        assert_eq!(search_condition(&[], &mut params), "1 = 0");
        assert!(params.is_empty());
    }

    #[test]
    fn negated_operators_over_related_rows() {
        assert_eq!(positive(Operator::NotContains), (Operator::Contains, true));
        assert_eq!(positive(Operator::None), (Operator::Any, true));
        assert_eq!(positive(Operator::StartsWith), (Operator::StartsWith, false));
    }

    #[test]
    fn me_resolves_to_viewer() {
        let viewer = User {
            id: 12,
            login: "me".to_string(),
            firstname: String::new(),
            lastname: String::new(),
            admin: false,
        };
        assert_eq!(
            user_ids(&["me".to_string(), "3".to_string()], &viewer),
            vec![12, 3]
        );
    }
}
