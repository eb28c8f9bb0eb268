use tabled::{
    Table, Tabled,
    settings::{Panel, Remove, Style, object::Rows},
};

#[derive(Debug, Clone, Default)]
pub struct Formatter {
    pub header:   Option<String>,
    pub footer:   Option<String>,
    /// Drop the column-name row.
    pub no_names: bool,
}

impl Formatter {
    pub fn build<T: Tabled, I: IntoIterator<Item = T>>(self, data: I) -> Table {
        let mut table = Table::new(data);
        table.with(Style::blank());

        if self.no_names {
            table.with(Remove::row(Rows::first()));
        }
        if let Some(header) = self.header {
            table.with(Panel::header(header));
        }
        if let Some(footer) = self.footer {
            table.with(Panel::footer(footer));
        }
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Tabled)]
    struct Row {
        id:    &'static str,
        state: &'static str,
    }

    #[test]
    fn test_build_without_names() {
        let rows = || [Row { id: "gemma", state: "complete" }];

        let named = Formatter::default().build(rows()).to_string();
        assert!(named.contains("id"));

        let bare = Formatter {
            no_names: true,
            footer: Some("1 entry".into()),
            ..Default::default()
        }
        .build(rows())
        .to_string();
        assert!(!bare.contains("state"));
        assert!(bare.contains("gemma"));
        assert!(bare.contains("1 entry"));
    }
}
