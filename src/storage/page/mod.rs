mod bat_page;
mod bucket_page;
mod header_page;

pub use bat_page::*;
pub use bucket_page::*;
pub use header_page::*;
