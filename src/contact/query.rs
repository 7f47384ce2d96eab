//! Contact list queries: filters, operators, columns and sort order.
//!
//! A `ContactQuery` is a plain description; the SQLite store translates it
//! into a statement with bound parameters.

use super::custom_field::{CustomField, FieldFormat};
use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

lazy_static! {
    static ref SEARCH_TOKEN_REGEX: Regex =
        Regex::new(r#""([^"]+)"|(\S+)"#).expect("valid search token regex");
}

/// Words beyond this many are ignored by the keyword search.
const MAX_SEARCH_TOKENS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    Equals,
    NotEquals,
    Any,
    None,
    GreaterOrEqual,
    LessOrEqual,
    Between,
    MoreThanDaysAgo,
    LessThanDaysAgo,
    Today,
    Yesterday,
    ThisWeek,
}

impl Operator {
    pub const ALL: [Operator; 16] = [
        Operator::Contains,
        Operator::NotContains,
        Operator::StartsWith,
        Operator::EndsWith,
        Operator::Equals,
        Operator::NotEquals,
        Operator::Any,
        Operator::None,
        Operator::GreaterOrEqual,
        Operator::LessOrEqual,
        Operator::Between,
        Operator::MoreThanDaysAgo,
        Operator::LessThanDaysAgo,
        Operator::Today,
        Operator::Yesterday,
        Operator::ThisWeek,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Contains => "~",
            Operator::NotContains => "!~",
            Operator::StartsWith => "^",
            Operator::EndsWith => "$",
            Operator::Equals => "=",
            Operator::NotEquals => "!",
            Operator::Any => "*",
            Operator::None => "!*",
            Operator::GreaterOrEqual => ">=",
            Operator::LessOrEqual => "<=",
            Operator::Between => "><",
            Operator::MoreThanDaysAgo => ">t-",
            Operator::LessThanDaysAgo => "<t-",
            Operator::Today => "t",
            Operator::Yesterday => "ld",
            Operator::ThisWeek => "w",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.as_str() == s)
    }

    /// Number of values the operator consumes.
    pub fn arity(&self) -> Arity {
        match self {
            Operator::Any
            | Operator::None
            | Operator::Today
            | Operator::Yesterday
            | Operator::ThisWeek => Arity::None,
            Operator::Between => Arity::Two,
            Operator::GreaterOrEqual
            | Operator::LessOrEqual
            | Operator::MoreThanDaysAgo
            | Operator::LessThanDaysAgo => Arity::One,
            _ => Arity::AtLeastOne,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    None,
    One,
    Two,
    AtLeastOne,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterType {
    Text,
    List,
    Integer,
    DatePast,
}

impl FilterType {
    pub fn operators(&self) -> &'static [Operator] {
        use Operator::*;
        match self {
            FilterType::Text => &[
                Contains,
                NotContains,
                StartsWith,
                EndsWith,
                Equals,
                NotEquals,
                Any,
                None,
            ],
            FilterType::List => &[Equals, NotEquals, Any, None],
            FilterType::Integer => &[Equals, NotEquals, Any, None],
            FilterType::DatePast => &[
                Equals,
                GreaterOrEqual,
                LessOrEqual,
                Between,
                MoreThanDaysAgo,
                LessThanDaysAgo,
                Today,
                Yesterday,
                ThisWeek,
                Any,
                None,
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterField {
    ProjectId,
    AuthorId,
    FirstName,
    LastName,
    Phone,
    Email,
    CreatedOn,
    UpdatedOn,
    ContactId,
    Attachment,
    UpdatedBy,
    LastUpdatedBy,
    ProjectStatus,
    CustomField(i64),
}

const STATIC_FILTERS: [FilterField; 13] = [
    FilterField::ProjectId,
    FilterField::AuthorId,
    FilterField::FirstName,
    FilterField::LastName,
    FilterField::Phone,
    FilterField::Email,
    FilterField::CreatedOn,
    FilterField::UpdatedOn,
    FilterField::ContactId,
    FilterField::Attachment,
    FilterField::UpdatedBy,
    FilterField::LastUpdatedBy,
    FilterField::ProjectStatus,
];

impl FilterField {
    pub fn name(&self) -> String {
        match self {
            FilterField::ProjectId => "project_id".to_string(),
            FilterField::AuthorId => "author_id".to_string(),
            FilterField::FirstName => "first_name".to_string(),
            FilterField::LastName => "last_name".to_string(),
            FilterField::Phone => "phone".to_string(),
            FilterField::Email => "email".to_string(),
            FilterField::CreatedOn => "created_on".to_string(),
            FilterField::UpdatedOn => "updated_on".to_string(),
            FilterField::ContactId => "contact_id".to_string(),
            FilterField::Attachment => "attachment".to_string(),
            FilterField::UpdatedBy => "updated_by".to_string(),
            FilterField::LastUpdatedBy => "last_updated_by".to_string(),
            FilterField::ProjectStatus => "project.status".to_string(),
            FilterField::CustomField(id) => format!("cf_{}", id),
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        if let Some(id) = name.strip_prefix("cf_") {
            return id.parse().ok().map(FilterField::CustomField);
        }
        STATIC_FILTERS.into_iter().find(|f| f.name() == name)
    }

    fn filter_type(&self, custom_fields: &[CustomField]) -> Option<FilterType> {
        Some(match self {
            FilterField::ProjectId
            | FilterField::AuthorId
            | FilterField::UpdatedBy
            | FilterField::LastUpdatedBy
            | FilterField::ProjectStatus => FilterType::List,
            FilterField::FirstName
            | FilterField::LastName
            | FilterField::Phone
            | FilterField::Email
            | FilterField::Attachment => FilterType::Text,
            FilterField::CreatedOn | FilterField::UpdatedOn => FilterType::DatePast,
            FilterField::ContactId => FilterType::Integer,
            FilterField::CustomField(id) => {
                let field = custom_fields.iter().find(|f| f.id == *id)?;
                match field.format {
                    FieldFormat::List | FieldFormat::Bool => FilterType::List,
                    FieldFormat::Date => FilterType::DatePast,
                    _ => FilterType::Text,
                }
            }
        })
    }

    /// List filters whose values are user ids; `me` stands for the viewer.
    pub fn takes_user_ids(&self) -> bool {
        matches!(
            self,
            FilterField::AuthorId | FilterField::UpdatedBy | FilterField::LastUpdatedBy
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub field: FilterField,
    pub operator: Operator,
    pub values: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueryColumn {
    Id,
    FirstName,
    LastName,
    Company,
    Phone,
    Email,
    CreatedOn,
    UpdatedOn,
    LastUpdatedBy,
    CustomField(i64),
}

const STATIC_COLUMNS: [QueryColumn; 9] = [
    QueryColumn::Id,
    QueryColumn::FirstName,
    QueryColumn::LastName,
    QueryColumn::Company,
    QueryColumn::Phone,
    QueryColumn::Email,
    QueryColumn::CreatedOn,
    QueryColumn::UpdatedOn,
    QueryColumn::LastUpdatedBy,
];

pub const DEFAULT_COLUMNS: [QueryColumn; 5] = [
    QueryColumn::Id,
    QueryColumn::FirstName,
    QueryColumn::LastName,
    QueryColumn::Phone,
    QueryColumn::Email,
];

impl QueryColumn {
    pub fn name(&self) -> String {
        match self {
            QueryColumn::Id => "id".to_string(),
            QueryColumn::FirstName => "first_name".to_string(),
            QueryColumn::LastName => "last_name".to_string(),
            QueryColumn::Company => "company".to_string(),
            QueryColumn::Phone => "phone".to_string(),
            QueryColumn::Email => "email".to_string(),
            QueryColumn::CreatedOn => "created_on".to_string(),
            QueryColumn::UpdatedOn => "updated_on".to_string(),
            QueryColumn::LastUpdatedBy => "last_updated_by".to_string(),
            QueryColumn::CustomField(id) => format!("cf_{}", id),
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        if let Some(id) = name.strip_prefix("cf_") {
            return id.parse().ok().map(QueryColumn::CustomField);
        }
        STATIC_COLUMNS.into_iter().find(|c| c.name() == name)
    }

    pub fn sortable(&self) -> bool {
        !matches!(self, QueryColumn::LastUpdatedBy)
    }

    pub fn groupable(&self) -> bool {
        matches!(self, QueryColumn::Company)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Some(SortDirection::Asc),
            "desc" => Some(SortDirection::Desc),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactQuery {
    /// Restricts the query to one project when set.
    pub project_id: Option<i64>,
    pub filters: Vec<Filter>,
    pub columns: Vec<QueryColumn>,
    pub sort: Vec<(QueryColumn, SortDirection)>,
    pub group_by: Option<QueryColumn>,
    /// Keywords matched against name, company, email and phone.
    pub search: Option<String>,
}

impl Default for ContactQuery {
    fn default() -> Self {
        Self::new(None)
    }
}

impl ContactQuery {
    pub fn new(project_id: Option<i64>) -> Self {
        Self {
            project_id,
            filters: vec![],
            columns: DEFAULT_COLUMNS.to_vec(),
            sort: vec![(QueryColumn::Id, SortDirection::Desc)],
            group_by: None,
            search: None,
        }
    }

    /// Blank text clears the search.
    pub fn set_search(&mut self, text: &str) {
        let text = text.trim();
        self.search = (!text.is_empty()).then(|| text.to_string());
    }

    /// Search words in order of appearance. A double quoted phrase is one
    /// word. Single characters and repeats are skipped.
    pub fn search_tokens(&self) -> Vec<String> {
        let Some(search) = &self.search else {
            return vec![];
        };
        let mut tokens: Vec<String> = Vec::new();
        for captures in SEARCH_TOKEN_REGEX.captures_iter(search) {
            let token = captures
                .get(1)
                .or_else(|| captures.get(2))
                .map(|m| m.as_str().trim().trim_matches('"'))
                .unwrap_or_default();
            if token.chars().count() > 1 && !tokens.iter().any(|t| t == token) {
                tokens.push(token.to_string());
            }
        }
        tokens.truncate(MAX_SEARCH_TOKENS);
        tokens
    }

    pub fn add_filter(&mut self, field: FilterField, operator: Operator, values: &[&str]) {
        self.filters.retain(|f| f.field != field);
        self.filters.push(Filter {
            field,
            operator,
            values: values.iter().map(|v| v.to_string()).collect(),
        });
    }

    /// Parses a `field:op:value[,value...]` expression.
    pub fn add_filter_expression(&mut self, expression: &str) -> Result<(), String> {
        let mut parts = expression.splitn(3, ':');
        let name = parts.next().unwrap_or_default();
        let op = parts.next().unwrap_or_default();
        let values: Vec<&str> = parts
            .next()
            .map(|v| v.split(',').filter(|s| !s.is_empty()).collect())
            .unwrap_or_default();
        let field = FilterField::parse(name).ok_or_else(|| format!("Unknown filter {}", name))?;
        let operator =
            Operator::from_str(op).ok_or_else(|| format!("Unknown operator {}", op))?;
        self.add_filter(field, operator, &values);
        Ok(())
    }

    pub fn has_column(&self, column: QueryColumn) -> bool {
        self.columns.contains(&column)
    }

    /// Filters a viewer may use, given the custom fields visible to them.
    pub fn available_filters(&self, custom_fields: &[CustomField]) -> Vec<FilterField> {
        STATIC_FILTERS
            .into_iter()
            .filter(|f| !(self.project_id.is_some() && *f == FilterField::ProjectId))
            .chain(custom_fields.iter().map(|cf| FilterField::CustomField(cf.id)))
            .collect()
    }

    /// Checks filters, columns and sort against what the viewer may use.
    /// Returns every problem found.
    pub fn validate(&self, custom_fields: &[CustomField]) -> Result<(), Vec<String>> {
        let available = self.available_filters(custom_fields);
        let mut errors = Vec::new();

        for filter in &self.filters {
            let name = filter.field.name();
            let filter_type = match filter.field.filter_type(custom_fields) {
                Some(t) if available.contains(&filter.field) => t,
                _ => {
                    errors.push(format!("Unknown filter {}", name));
                    continue;
                }
            };
            if !filter_type.operators().contains(&filter.operator) {
                errors.push(format!(
                    "{} operator {} is not valid",
                    name,
                    filter.operator.as_str()
                ));
                continue;
            }
            if let Err(e) = validate_values(filter, filter_type) {
                errors.push(e);
            }
        }

        let column_known = |column: &QueryColumn| match column {
            QueryColumn::CustomField(id) => custom_fields.iter().any(|f| f.id == *id),
            _ => true,
        };
        for column in &self.columns {
            if !column_known(column) {
                errors.push(format!("Unknown column {}", column.name()));
            }
        }
        for (column, _) in &self.sort {
            if !column_known(column) || !column.sortable() {
                errors.push(format!("Cannot sort by {}", column.name()));
            }
        }
        if let Some(group) = &self.group_by {
            if !group.groupable() {
                errors.push(format!("Cannot group by {}", group.name()));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

fn validate_values(filter: &Filter, filter_type: FilterType) -> Result<(), String> {
    let name = filter.field.name();
    let values = &filter.values;
    let count_ok = match filter.operator.arity() {
        Arity::None => true,
        Arity::One => values.len() == 1,
        Arity::Two => values.len() == 2,
        Arity::AtLeastOne => !values.is_empty(),
    };
    if !count_ok || values.iter().any(|v| v.trim().is_empty()) && filter.operator.arity() != Arity::None {
        return Err(format!("{} cannot be blank", name));
    }
    if filter.operator.arity() == Arity::None {
        return Ok(());
    }

    let invalid = || format!("{} is invalid", name);
    match filter_type {
        FilterType::DatePast => match filter.operator {
            Operator::MoreThanDaysAgo | Operator::LessThanDaysAgo => {
                values[0].parse::<u32>().map_err(|_| invalid())?;
            }
            _ => {
                for value in values {
                    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| invalid())?;
                }
            }
        },
        FilterType::Integer => {
            for value in values {
                parse_id_list(value).ok_or_else(invalid)?;
            }
        }
        FilterType::List => {
            let numeric = !matches!(filter.field, FilterField::CustomField(_));
            for value in values {
                let is_me = filter.field.takes_user_ids() && value == "me";
                if numeric && !is_me && value.parse::<i64>().is_err() {
                    return Err(invalid());
                }
            }
        }
        FilterType::Text => {}
    }
    Ok(())
}

/// Parses `"1, 2,3"` into ids; `None` when any part is not a number.
pub fn parse_id_list(value: &str) -> Option<Vec<i64>> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<i64>().ok())
        .collect()
}
