// src/extractors/table.rs
//
// Normalizes an HTML table with arbitrary rowspan/colspan attributes into a
// dense rectangular matrix. The portal's result pages lean heavily on spanned
// header cells, so everything downstream works off the normalized shape.

use scraper::ElementRef;
use std::collections::HashMap;

/// One physical `<td>`/`<th>` as it appears in the markup.
///
/// A rowspan of 0 means "span to the bottom of the table"; a colspan of 0
/// means "span to the last column" and is only honored on a row's final cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCell {
    pub text: String,
    pub rowspan: u32,
    pub colspan: u32,
}

impl RawCell {
    pub fn new(text: impl Into<String>, rowspan: u32, colspan: u32) -> Self {
        Self {
            text: text.into(),
            rowspan,
            colspan,
        }
    }
}

/// Ordered rows of physical cells, straight from the markup.
#[derive(Debug, Clone, Default)]
pub struct RawTable {
    pub rows: Vec<Vec<RawCell>>,
}

/// Rectangular matrix of cell text. `None` marks a position no cell occupies.
pub type NormalizedMatrix = Vec<Vec<Option<String>>>;

impl RawTable {
    /// Builds a `RawTable` from a `<table>` element.
    ///
    /// Only `<tr>` elements belonging to this table are taken (rows of nested
    /// tables are skipped), and only a row's direct `<td>`/`<th>` children
    /// count as cells. Cell text includes nested markup text, matching how the
    /// portal renders labels inside spans and fonts.
    pub fn from_element(table: ElementRef) -> Self {
        let mut rows = Vec::new();
        for tr in table
            .select(&super::selectors::TR)
            .filter(|tr| nearest_table(*tr).map(|t| t.id()) == Some(table.id()))
        {
            let mut cells = Vec::new();
            for child in tr.children().filter_map(ElementRef::wrap) {
                let name = child.value().name();
                if name != "td" && name != "th" {
                    continue;
                }
                cells.push(RawCell {
                    text: child.text().collect::<String>(),
                    rowspan: span_attr(child, "rowspan"),
                    colspan: span_attr(child, "colspan"),
                });
            }
            rows.push(cells);
        }
        Self { rows }
    }
}

fn span_attr(cell: ElementRef, attr: &str) -> u32 {
    cell.value()
        .attr(attr)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(1)
}

/// The `<table>` ancestor closest to `el`, if any.
pub(crate) fn nearest_table(el: ElementRef) -> Option<ElementRef> {
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .find(|a| a.value().name() == "table")
}

/// Converts a raw table into a rectangular matrix, repeating each spanning
/// cell's text into every position it covers.
///
/// Two passes: the first sizes the matrix, the second fills it. Sizing counts
/// a row's last cell as exactly one column regardless of its declared colspan,
/// so "fill to end" spans never manufacture phantom trailing columns. Writes
/// landing outside the matrix are dropped; overlapping spans resolve
/// last-write-wins in scan order.
pub fn normalize(raw: &RawTable) -> NormalizedMatrix {
    let rows = &raw.rows;
    let total_rows = rows.len();

    // Pass 1: column count, tracking rowspans carried over from prior rows.
    let mut colcount = 0usize;
    let mut carried: Vec<u32> = Vec::new();
    for (r, row) in rows.iter().enumerate() {
        let mut width = carried.len();
        if let Some((_last, init)) = row.split_last() {
            for cell in init {
                width += if cell.colspan == 0 { 1 } else { cell.colspan as usize };
            }
            // Last cell always contributes a single column here.
            width += 1;
        }
        colcount = colcount.max(width);
        for cell in row {
            let span = if cell.rowspan == 0 {
                (total_rows - r) as u32
            } else {
                cell.rowspan
            };
            carried.push(span);
        }
        carried.retain(|s| *s > 1);
        for s in &mut carried {
            *s -= 1;
        }
    }

    // Rowspans still pending after the last row are ignored; there are no
    // further rows to extend into.

    let mut matrix: NormalizedMatrix = vec![vec![None; colcount]; total_rows];

    // Pass 2: fill, skipping columns claimed by active rowspans.
    let mut active: HashMap<usize, u32> = HashMap::new();
    for (r, row) in rows.iter().enumerate() {
        let mut span_offset = 0usize;
        for (i, cell) in row.iter().enumerate() {
            let mut col = i + span_offset;
            while active.get(&col).copied().unwrap_or(0) > 0 {
                span_offset += 1;
                col += 1;
            }

            let rowspan = if cell.rowspan == 0 {
                total_rows - r
            } else {
                cell.rowspan as usize
            };
            active.insert(col, rowspan as u32);
            let colspan = if cell.colspan == 0 {
                colcount.saturating_sub(col)
            } else {
                cell.colspan as usize
            };
            span_offset += colspan.saturating_sub(1);

            for drow in 0..rowspan {
                for dcol in 0..colspan {
                    if r + drow < total_rows && col + dcol < colcount {
                        matrix[r + drow][col + dcol] = Some(cell.text.clone());
                        active.insert(col + dcol, rowspan as u32);
                    }
                }
            }
        }
        active = active
            .into_iter()
            .filter(|(_, s)| *s > 1)
            .map(|(c, s)| (c, s - 1))
            .collect();
    }

    matrix
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::{Html, Selector};

    fn cell(text: &str) -> RawCell {
        RawCell::new(text, 1, 1)
    }

    fn table_from(html: &str) -> RawTable {
        let doc = Html::parse_document(html);
        let sel = Selector::parse("table").unwrap();
        let el = doc.select(&sel).next().expect("no table in fixture");
        RawTable::from_element(el)
    }

    #[test]
    fn spanless_table_is_identity_reshape() {
        let raw = RawTable {
            rows: vec![
                vec![cell("a"), cell("b")],
                vec![cell("c"), cell("d")],
            ],
        };
        let m = normalize(&raw);
        assert_eq!(
            m,
            vec![
                vec![Some("a".into()), Some("b".into())],
                vec![Some("c".into()), Some("d".into())],
            ]
        );
    }

    #[test]
    fn two_by_two_span_fills_its_rectangle() {
        let raw = RawTable {
            rows: vec![
                vec![RawCell::new("big", 2, 2), cell("r0")],
                vec![cell("r1")],
            ],
        };
        let m = normalize(&raw);
        assert_eq!(m[0][0].as_deref(), Some("big"));
        assert_eq!(m[0][1].as_deref(), Some("big"));
        assert_eq!(m[1][0].as_deref(), Some("big"));
        assert_eq!(m[1][1].as_deref(), Some("big"));
        assert_eq!(m[0][2].as_deref(), Some("r0"));
        assert_eq!(m[1][2].as_deref(), Some("r1"));
    }

    #[test]
    fn colspan_zero_on_last_cell_extends_to_final_column_only() {
        let raw = RawTable {
            rows: vec![
                vec![cell("a"), cell("b"), cell("c")],
                vec![cell("x"), RawCell::new("rest", 1, 0)],
            ],
        };
        let m = normalize(&raw);
        assert_eq!(m[0].len(), 3);
        assert_eq!(m[1].len(), 3);
        assert_eq!(m[1][1].as_deref(), Some("rest"));
        assert_eq!(m[1][2].as_deref(), Some("rest"));
    }

    #[test]
    fn rowspan_zero_extends_to_bottom() {
        let raw = RawTable {
            rows: vec![
                vec![RawCell::new("tall", 0, 1), cell("a")],
                vec![cell("b")],
                vec![cell("c")],
            ],
        };
        let m = normalize(&raw);
        assert_eq!(m[0][0].as_deref(), Some("tall"));
        assert_eq!(m[1][0].as_deref(), Some("tall"));
        assert_eq!(m[2][0].as_deref(), Some("tall"));
        assert_eq!(m[1][1].as_deref(), Some("b"));
        assert_eq!(m[2][1].as_deref(), Some("c"));
    }

    #[test]
    fn out_of_bounds_spans_are_dropped() {
        let raw = RawTable {
            rows: vec![vec![RawCell::new("deep", 5, 5)]],
        };
        let m = normalize(&raw);
        assert_eq!(m.len(), 1);
        assert_eq!(m[0].len(), 1);
        assert_eq!(m[0][0].as_deref(), Some("deep"));
    }

    #[test]
    fn empty_table_yields_empty_matrix() {
        let m = normalize(&RawTable::default());
        assert!(m.is_empty());
        let m = normalize(&RawTable { rows: vec![vec![]] });
        assert_eq!(m, vec![Vec::<Option<String>>::new()]);
    }

    #[test]
    fn overlapping_spans_resolve_last_write_wins() {
        // The second row's cell lands where the first row's rowspan already
        // wrote; scan order means the later write survives... except active
        // rowspan tracking shifts the incoming cell right instead. The third
        // column stays untouched by any physical cell in row 1.
        let raw = RawTable {
            rows: vec![
                vec![RawCell::new("span", 2, 1), cell("a"), cell("b")],
                vec![cell("x")],
            ],
        };
        let m = normalize(&raw);
        assert_eq!(m[1][0].as_deref(), Some("span"));
        assert_eq!(m[1][1].as_deref(), Some("x"));
        assert_eq!(m[1][2], None);
    }

    #[test]
    fn builds_raw_table_from_markup_skipping_nested_rows() {
        let raw = table_from(
            r#"<table>
                 <tr><td rowspan="2">a</td><td>outer <table><tr><td>inner</td></tr></table></td></tr>
                 <tr><td colspan="0">b</td></tr>
               </table>"#,
        );
        assert_eq!(raw.rows.len(), 2);
        assert_eq!(raw.rows[0][0], RawCell::new("a", 2, 1));
        assert_eq!(raw.rows[0][1].text.trim(), "outer inner");
        assert_eq!(raw.rows[1][0], RawCell::new("b", 1, 0));
    }
}
