pub mod icons;
pub mod output;
pub mod progress;
pub mod table;
pub mod theme;

pub use icons::Icons;
pub use output::{
    class_name, dim, header, muted, scan_summary, section, status, success, summary_row, warn,
};
pub use progress::Spinner;
pub use table::{TableBuilder, search_table, stats_table};
pub use theme::{Theme, theme};
