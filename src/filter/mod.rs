pub mod error;
pub mod memory;
pub mod params;
pub mod query;
pub mod types;

pub use error::FilterError;
pub use memory::{filter_by_fields_in_memory, filter_in_memory, paginate_in_memory};
pub use params::{parse_filter_params, parse_list_params, ListQueryParams};
pub use query::{apply_filters, apply_pagination, apply_search, CollectionQuery};
pub use types::*;
