use std::fmt::Display;
use std::str::FromStr;

use crate::errors::MdbError;

/// Columns results may be sorted by. Only these identifiers ever reach the
/// ORDER BY clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortColumn {
    Id,
    TitleEng,
    TitleForeign,
    Pages,
    Rating,
    MyRating,
    LastChange,
    LastUpdate,
}

impl SortColumn {
    const ALL: [SortColumn; 8] = [
        SortColumn::Id,
        SortColumn::TitleEng,
        SortColumn::TitleForeign,
        SortColumn::Pages,
        SortColumn::Rating,
        SortColumn::MyRating,
        SortColumn::LastChange,
        SortColumn::LastUpdate,
    ];

    pub fn column(&self) -> &'static str {
        match self {
            SortColumn::Id => "id",
            SortColumn::TitleEng => "title_eng",
            SortColumn::TitleForeign => "title_foreign",
            SortColumn::Pages => "pages",
            SortColumn::Rating => "rating",
            SortColumn::MyRating => "my_rating",
            SortColumn::LastChange => "last_change",
            SortColumn::LastUpdate => "last_update",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn keyword(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderBy {
    pub column: SortColumn,
    pub direction: SortDirection,
}

impl Default for OrderBy {
    fn default() -> Self {
        OrderBy {
            column: SortColumn::Id,
            direction: SortDirection::Desc,
        }
    }
}

impl OrderBy {
    /// ORDER BY clause body. `id` is appended as tie-breaker so pages are stable.
    pub fn to_sql(&self, table_alias: &str) -> String {
        let dir = self.direction.keyword();
        match self.column {
            SortColumn::Id => format!("{table_alias}.id {dir}"),
            col => format!("{table_alias}.{} {dir}, {table_alias}.id {dir}", col.column()),
        }
    }
}

/// Parses `"<column> [ASC|DESC]"`, e.g. `"pages DESC"` or `"b.rating asc"`
impl FromStr for OrderBy {
    type Err = MdbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split_whitespace();
        let col = parts.next().ok_or_else(|| MdbError::InvalidSort(s.to_string()))?;
        let col = col.rsplit_once('.').map(|(_, c)| c).unwrap_or(col);
        let column = SortColumn::ALL
            .into_iter()
            .find(|c| c.column().eq_ignore_ascii_case(col))
            .ok_or_else(|| MdbError::InvalidSort(s.to_string()))?;
        let direction = match parts.next() {
            None => SortDirection::Asc,
            Some(d) if d.eq_ignore_ascii_case("asc") => SortDirection::Asc,
            Some(d) if d.eq_ignore_ascii_case("desc") => SortDirection::Desc,
            Some(_) => return Err(MdbError::InvalidSort(s.to_string())),
        };
        if parts.next().is_some() {
            return Err(MdbError::InvalidSort(s.to_string()));
        }
        Ok(OrderBy { column, direction })
    }
}

impl Display for OrderBy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.column.column(), self.direction.keyword())
    }
}
