//! Terminal UI utilities.
//!
//! A small auto-sizing table with Unicode box-drawing borders, used by the
//! `targets` and `status` commands.

use colored::*;
use std::cmp;

pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: &[&str]) -> Self {
        Self {
            headers: headers.iter().map(|s| s.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn add_row(&mut self, row: Vec<String>) {
        if row.len() == self.headers.len() {
            self.rows.push(row);
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Column widths that fit `max_width`, shrinking the widest column first.
    fn column_widths(&self, max_width: usize) -> Vec<usize> {
        let mut widths: Vec<usize> = self
            .headers
            .iter()
            .map(|h| console::measure_text_width(h))
            .collect();
        for row in &self.rows {
            for (i, cell) in row.iter().enumerate() {
                widths[i] = cmp::max(widths[i], console::measure_text_width(cell));
            }
        }

        let overhead = 3 + 3 * self.headers.len();
        let available = max_width.saturating_sub(overhead);
        let mut total: usize = widths.iter().sum();
        while total > available {
            let Some((idx, &widest)) = widths.iter().enumerate().max_by_key(|(_, w)| **w) else {
                break;
            };
            if widest <= 8 {
                break;
            }
            widths[idx] -= 1;
            total -= 1;
        }
        widths
    }

    pub fn render(&self, max_width: usize) -> String {
        if self.headers.is_empty() {
            return String::new();
        }
        let widths = self.column_widths(max_width);

        let sep = |left: &str, mid: &str, right: &str| -> String {
            let inner: Vec<String> = widths.iter().map(|w| "─".repeat(w + 2)).collect();
            format!("  {}{}{}", left, inner.join(mid), right)
        };
        let line = |cells: &[String], bold: bool| -> String {
            let mut s = String::from("  │");
            for (cell, &width) in cells.iter().zip(&widths) {
                let clean = cell.replace(['\n', '\r', '\t'], " ");
                let text = console::truncate_str(&clean, width, "...").to_string();
                let padding = width.saturating_sub(console::measure_text_width(&text));
                let text = if bold { text.bold().to_string() } else { text };
                s.push_str(&format!(" {}{} │", text, " ".repeat(padding)));
            }
            s
        };

        let mut out = Vec::with_capacity(self.rows.len() + 4);
        out.push(sep("┌", "┬", "┐"));
        out.push(line(&self.headers, true));
        out.push(sep("├", "┼", "┤"));
        for row in &self.rows {
            out.push(line(row, false));
        }
        out.push(sep("└", "┴", "┘"));
        out.join("\n")
    }

    pub fn print(&self) {
        let (_, term_width) = console::Term::stdout().size();
        println!("{}", self.render(term_width as usize));
    }
}
