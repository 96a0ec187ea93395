use tabled::{Table, Tabled, settings::Style};

use crate::symbol::DocumentSymbol;

#[derive(Tabled)]
pub struct SymbolRow {
    #[tabled(rename = "Name")]
    pub name: String,
    #[tabled(rename = "Kind")]
    pub kind: String,
    #[tabled(rename = "Offset")]
    pub offset: String,
}

#[derive(Tabled)]
pub struct TableRow {
    #[tabled(rename = "Metric")]
    pub metric: String,
    #[tabled(rename = "Value")]
    pub value: String,
}

/// Outline of a grammar file
pub fn symbols_table(symbols: &[DocumentSymbol]) -> String {
    if symbols.is_empty() {
        return String::new();
    }
    let rows: Vec<SymbolRow> = symbols
        .iter()
        .map(|s| SymbolRow {
            name: s.name.clone(),
            kind: s.classification.label().to_string(),
            offset: format!("{}..{}", s.start, s.end),
        })
        .collect();
    Table::new(rows).with(Style::rounded()).to_string()
}

pub fn stats_table(stats: &[(&str, String)]) -> String {
    if stats.is_empty() {
        return String::new();
    }
    let rows: Vec<TableRow> = stats
        .iter()
        .map(|(label, value)| TableRow { metric: label.to_string(), value: value.clone() })
        .collect();
    Table::new(rows).with(Style::rounded()).to_string()
}
