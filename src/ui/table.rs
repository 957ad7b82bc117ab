use tabled::{Table, Tabled, settings::Style};

use crate::query::{Statistics, UnitSummary};

#[derive(Tabled)]
pub struct TableRow {
    #[tabled(rename = "Metric")]
    pub metric: String,
    #[tabled(rename = "Value")]
    pub value: String,
}

#[derive(Tabled)]
struct SearchRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Class")]
    class: String,
    #[tabled(rename = "Package")]
    package: String,
    #[tabled(rename = "Jar")]
    jar: String,
    #[tabled(rename = "Match")]
    tier: &'static str,
}

#[derive(Default)]
pub struct TableBuilder {
    rows: Vec<TableRow>,
}

impl TableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_row(&mut self, label: &str, value: &str) {
        self.rows.push(TableRow {
            metric: label.to_string(),
            value: value.to_string(),
        });
    }

    pub fn build(&self) -> String {
        if self.rows.is_empty() {
            return String::new();
        }
        Table::new(&self.rows).with(Style::rounded()).to_string()
    }
}

pub fn stats_table(stats: &Statistics) -> String {
    let mut builder = TableBuilder::new();
    builder.add_row("Indexed entries", &stats.total_units.to_string());
    builder.add_row("Classes", &stats.distinct_classes.to_string());
    builder.add_row("Packages", &stats.distinct_packages.to_string());
    builder.add_row("Jars", &stats.distinct_archives.to_string());
    builder.build()
}

/// One row per hit; jar paths are shown relative to `root` when under it
pub fn search_table(results: &[UnitSummary], root: Option<&std::path::Path>) -> String {
    let rows: Vec<_> = results
        .iter()
        .enumerate()
        .map(|(i, unit)| SearchRow {
            index: i + 1,
            class: crate::unit::simple_name_of(&unit.qualified_name).to_string(),
            package: unit.package_name.clone(),
            jar: shorten(&unit.archive_path, root),
            tier: unit.tier.map(|t| t.as_str()).unwrap_or("-"),
        })
        .collect();
    Table::new(rows).with(Style::rounded()).to_string()
}

fn shorten(archive_path: &str, root: Option<&std::path::Path>) -> String {
    let path = std::path::Path::new(archive_path);
    root.and_then(|r| path.strip_prefix(r).ok())
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| archive_path.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::MatchTier;
    use crate::unit::Members;

    #[test]
    fn test_stats_table_lists_counts() {
        let table = stats_table(&Statistics {
            total_units: 12,
            distinct_classes: 10,
            distinct_packages: 3,
            distinct_archives: 2,
        });
        assert!(table.contains("Indexed entries"));
        assert!(table.contains("12"));
        assert!(table.contains("Jars"));
    }

    #[test]
    fn test_search_table_shortens_paths_under_root() {
        let results = vec![UnitSummary {
            qualified_name: "com.acme.Foo".into(),
            package_name: "com.acme".into(),
            archive_path: "/repo/com/acme/foo/1.0/foo-1.0.jar".into(),
            members: Members::default(),
            tier: Some(MatchTier::Exact),
        }];
        let table = search_table(&results, Some(std::path::Path::new("/repo")));
        assert!(table.contains("Foo"));
        assert!(table.contains("com/acme/foo/1.0/foo-1.0.jar"));
        assert!(!table.contains("/repo/com"));
        assert!(table.contains("exact"));
    }

    #[test]
    fn test_empty_builder_renders_nothing() {
        assert!(TableBuilder::new().build().is_empty());
    }
}
