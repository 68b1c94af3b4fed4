pub mod assoc;
pub mod book;
pub mod ext_link;
pub mod record;
pub mod status;
pub mod title;

pub use assoc::AssocKind;
pub use book::{AssocChange, Book, BookColumns, ColumnDiff};
pub use ext_link::ExternalLink;
pub use record::ExtractedRecord;
pub use status::{Censorship, Status};
