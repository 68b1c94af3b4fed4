pub mod compiler;
pub mod order;
pub mod parser;

pub use compiler::{compile, CompiledQuery};
pub use order::{OrderBy, SortColumn, SortDirection};
pub use parser::{parse_query, LanguageResolver, ParsedQuery, ScalarKey, ScalarValue};
