pub mod icons;
pub mod output;
pub mod table;
pub mod theme;

pub use icons::Icons;
pub use output::{
    diagnostic, dim, error, file_deleted, file_modified, header, info, line_col, location, muted,
    position, section, status, success, summary_row, warn,
};
pub use table::{stats_table, symbols_table};
pub use theme::{theme, Theme};
