//! Catuan Core: reply values, route labels, pagination and validation helpers
//! shared by the dispatch server and the layers around it.

pub mod labels;
pub mod pagination;
pub mod reply;
pub mod util;

pub use labels::RouteLabels;
pub use pagination::{PageBounds, PageWindow, Pagination};
pub use reply::{Reply, ERR_CODE_DENIED, ERR_CODE_OK};
